use trackable::prelude::*;

#[derive(Clone, Debug, PartialEq, Trackable)]
struct Address {
    street: String,
    city: String,
}

#[derive(Clone, Debug, PartialEq, Trackable)]
struct LineItem {
    sku: String,
    quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Trackable)]
struct Customer {
    name: String,
    #[trackable(complex)]
    billing_address: Address,
    #[trackable(collection)]
    cart: Vec<LineItem>,
}

fn sample_customer() -> Customer {
    Customer {
        name: "Ada Lovelace".into(),
        billing_address: Address { street: "12 Analytical Engine Way".into(), city: "London".into() },
        cart: vec![
            LineItem { sku: "book".into(), quantity: 1 },
            LineItem { sku: "pen".into(), quantity: 3 },
        ],
    }
}

/// Scenario: a scalar mutated then set back to its original value reverts
/// to Unchanged without an explicit reject.
#[test]
fn scalar_set_back_to_original_reverts_to_unchanged() {
    let mut tr = TrackedRecord::wrap(sample_customer());
    assert_eq!(tr.status(), Status::Unchanged);

    tr.set("name", "Ada King".to_string());
    assert_eq!(tr.status(), Status::Changed);

    tr.set("name", "Ada Lovelace".to_string());
    assert_eq!(tr.status(), Status::Unchanged);
}

/// Scenario: remove an item then reinsert it at its original index cancels
/// the removal entirely.
#[test]
fn remove_then_reinsert_same_index_cancels() {
    let mut tr = TrackedRecord::wrap(sample_customer());
    let cart = tr.collection::<LineItem>("cart").unwrap();
    let id = cart.get(0).unwrap().id();

    cart.remove(id).unwrap();
    cart.reinsert(0, id).unwrap();

    assert!(!cart.is_changed());
    assert_eq!(cart.deleted_items().count(), 0);
    assert_eq!(cart.get(0).unwrap().id(), id);
}

/// Scenario: remove a mutated item then reinsert it at a different index —
/// the mutation survives and the item reports Changed, not Unchanged.
#[test]
fn remove_then_reinsert_different_index_keeps_mutation_changed() {
    let mut tr = TrackedRecord::wrap(sample_customer());
    let cart = tr.collection::<LineItem>("cart").unwrap();
    let id = cart.get(1).unwrap().id();

    {
        let pos = (0..cart.len()).find(|&i| cart.get(i).unwrap().id() == id).unwrap();
        cart.get_mut(pos).unwrap().set("quantity", 99_u32);
    }
    cart.remove(id).unwrap();
    cart.reinsert(0, id).unwrap();

    let item = cart.iter().find(|tr| tr.id() == id).unwrap();
    assert_eq!(item.status(), Status::Changed);
    assert_eq!(item.get::<u32>("quantity"), 99);
}

/// Scenario: moving an item between two sibling collections (e.g. a cart
/// split into two baskets) is expressed as remove from one, insert (fresh)
/// into the other — the moved item is Added in its new home and the
/// original slot is freed (or Deleted, if the source collection still
/// holds the original snapshot).
#[test]
fn move_across_sibling_collections_is_remove_then_insert() {
    let mut source = TrackedCollection::track(vec![
        LineItem { sku: "book".into(), quantity: 1 },
        LineItem { sku: "pen".into(), quantity: 3 },
    ])
    .unwrap();
    let mut destination = TrackedCollection::<LineItem>::track(Vec::new()).unwrap();

    let moving_id = source.get(1).unwrap().id();
    let value = source.remove(moving_id).unwrap();
    destination.insert(0, value.clone());

    assert_eq!(source.len(), 1);
    assert_eq!(source.deleted_items().count(), 1);
    assert_eq!(destination.len(), 1);
    assert_eq!(destination.added_items().count(), 1);
    assert_eq!(destination.get(0).unwrap().current(), &value);
}

/// Scenario: rejecting after a cross-collection move restores the source
/// collection to exactly its prior shape, independent of what the
/// destination collection does with its own (still-Added) copy.
#[test]
fn reject_after_cross_collection_move_restores_source() {
    let mut source = TrackedCollection::track(vec![
        LineItem { sku: "book".into(), quantity: 1 },
        LineItem { sku: "pen".into(), quantity: 3 },
    ])
    .unwrap();
    let moving_id = source.get(1).unwrap().id();
    let moved_value = source.remove(moving_id).unwrap();

    source.reject_changes();

    assert_eq!(source.len(), 2);
    assert_eq!(source.get(1).unwrap().id(), moving_id);
    assert_eq!(source.get(1).unwrap().current(), &moved_value);
    assert!(!source.is_changed());
}

/// Scenario: reject restores a deleted item to its original index even
/// when other removals and insertions happened around it.
#[test]
fn reject_restores_deleted_item_to_original_index_amid_other_edits() {
    let mut cart = TrackedCollection::track(vec![
        LineItem { sku: "a".into(), quantity: 1 },
        LineItem { sku: "b".into(), quantity: 1 },
        LineItem { sku: "c".into(), quantity: 1 },
    ])
    .unwrap();

    let b_id = cart.get(1).unwrap().id();
    cart.remove(b_id).unwrap();
    cart.insert(0, LineItem { sku: "new".into(), quantity: 5 });

    cart.reject_changes();

    assert_eq!(cart.len(), 3);
    assert_eq!(cart.get(1).unwrap().id(), b_id);
    assert!(!cart.is_changed());
}

#[test]
fn nested_complex_field_changes_roll_up_to_parent_status() {
    let mut tr = TrackedRecord::wrap(sample_customer());
    assert_eq!(tr.status(), Status::Unchanged);

    let address = tr.complex::<Address>("billing_address").unwrap().unwrap();
    address.set("city", "Manchester".to_string());

    assert_eq!(tr.status(), Status::Changed);

    tr.accept_changes();
    assert_eq!(tr.status(), Status::Unchanged);
    assert_eq!(tr.current().billing_address.city, "Manchester");
}

#[test]
fn nested_collection_changes_roll_up_to_parent_status() {
    let mut tr = TrackedRecord::wrap(sample_customer());

    let added_id = {
        let cart = tr.collection::<LineItem>("cart").unwrap();
        cart.insert(cart.len(), LineItem { sku: "eraser".into(), quantity: 2 })
    };
    assert_eq!(tr.status(), Status::Changed);

    tr.reject_changes();
    assert_eq!(tr.status(), Status::Unchanged);
    assert!(tr.current().cart.iter().all(|item| item.sku != "eraser"));
    let _ = added_id;
}
