//! Tracked collections (C4 Collection Tracker).

use core::any::Any;

use crate::any_tracked::AnyTracked;
use crate::error::Error;
use crate::record::{ItemId, TrackedRecord};
use crate::schema::{Trackable, TrackingConfig};
use crate::status::Status;

type Observer<E> = Box<dyn FnMut(&E) + Send + Sync>;

/// A tracked wrapper around an ordered sequence of records (`TC<E>` in the
/// design).
///
/// Holds the currently visible `items`, the `deleted` set (with each
/// item's original index), and `original_snapshot` — the membership at the
/// last accept, used for identity comparisons and for reject.
pub struct TrackedCollection<E: Trackable> {
    items: Vec<TrackedRecord<E>>,
    deleted: Vec<(TrackedRecord<E>, usize)>,
    original_snapshot: Vec<ItemId>,
    cfg: TrackingConfig,
    on_insertion: Option<Observer<E>>,
    on_removal: Option<Observer<E>>,
}

impl<E: Trackable> TrackedCollection<E> {
    /// Wraps a plain `Vec`, with every element starting `Unchanged`.
    pub fn track(items: Vec<E>) -> Result<Self, Error> {
        Self::track_with_config(items, TrackingConfig::default())
    }

    /// Wraps a plain `Vec` with the given [`TrackingConfig`].
    pub fn track_with_config(items: Vec<E>, cfg: TrackingConfig) -> Result<Self, Error> {
        let items: Vec<TrackedRecord<E>> = items
            .into_iter()
            .map(|value| {
                let tr = TrackedRecord::wrap_with_config(value, cfg);
                tr.mark_owned();
                tr
            })
            .collect();
        let original_snapshot = items.iter().map(TrackedRecord::id).collect();

        #[cfg(feature = "tracing")]
        tracing::trace!(len = items.len(), "wrapped collection");

        Ok(TrackedCollection {
            items,
            deleted: Vec::new(),
            original_snapshot,
            cfg,
            on_insertion: None,
            on_removal: None,
        })
    }

    /// Wraps a sequence of already-tracked records, e.g. when assembling a
    /// collection out of records another call site already wrapped.
    /// Fails with [`Error::AlreadyTracking`] if any of them is already a
    /// member of some other tracked collection — the re-wrap rejection of
    /// §4.4, adapted to Rust: our `track` can't structurally receive an
    /// already-tracked `Vec<E>` (the type itself is `Vec<E>`, not
    /// `Vec<TrackedRecord<E>>`), so this is the one entry point where the
    /// double-wrap hazard can actually occur.
    pub fn track_existing(items: Vec<TrackedRecord<E>>) -> Result<Self, Error> {
        if items.iter().any(TrackedRecord::is_owned) {
            return Err(Error::AlreadyTracking);
        }
        for tr in &items {
            tr.mark_owned();
        }
        let original_snapshot = items.iter().map(TrackedRecord::id).collect();
        Ok(TrackedCollection {
            items,
            deleted: Vec::new(),
            original_snapshot,
            cfg: TrackingConfig::default(),
            on_insertion: None,
            on_removal: None,
        })
    }

    /// Always fails with [`Error::UnsupportedContainer`]: a boxed slice
    /// can't express insert/remove in place, so it can never back a
    /// [`TrackedCollection`] (§4.4 "Non-sequence inputs").
    pub fn track_boxed_slice(_items: Box<[E]>) -> Result<Self, Error> {
        Err(Error::UnsupportedContainer)
    }

    /// Registers a callback invoked after every successful insertion
    /// (including undelete/reinsert), mirroring the observer-hook pattern
    /// used for storage-level insert/remove notifications elsewhere in the
    /// ambient stack.
    pub fn on_insertion(&mut self, callback: impl FnMut(&E) + Send + Sync + 'static) {
        self.on_insertion = Some(Box::new(callback));
    }

    /// Registers a callback invoked after every successful removal.
    pub fn on_removal(&mut self, callback: impl FnMut(&E) + Send + Sync + 'static) {
        self.on_removal = Some(Box::new(callback));
    }

    /// Number of currently visible items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if there are no currently visible items (deleted items are
    /// not counted).
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrows the tracked item at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&TrackedRecord<E>> {
        self.items.get(index)
    }

    /// Mutably borrows the tracked item at `index`, if any — the entry
    /// point for scalar/complex/collection edits on an item already
    /// living in this collection.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut TrackedRecord<E>> {
        self.items.get_mut(index)
    }

    /// Iterates every currently visible tracked item, in order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedRecord<E>> {
        self.items.iter()
    }

    /// Mutably iterates every currently visible tracked item, in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedRecord<E>> {
        self.items.iter_mut()
    }

    /// Inserts a brand-new value at `index` (clamped to the current
    /// length), always `Added` — this is the "value is not already a
    /// tracked wrapper" branch of §4.4's Insert algorithm.
    pub fn insert(&mut self, index: usize, value: E) -> ItemId {
        let tr = TrackedRecord::wrap_with_config(value, self.cfg);
        tr.mark_owned();
        tr.set_membership(Some(Status::Added));
        let id = tr.id();
        let index = index.min(self.items.len());
        self.items.insert(index, tr);
        if let Some(callback) = &mut self.on_insertion {
            callback(self.items[index].current());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(index, "item added");

        id
    }

    /// Removes the item with identity `id` from `items`. If it was `Added`
    /// (never part of `original_snapshot`), it's dropped entirely —
    /// §4.4's Remove step 3. Otherwise it's archived into `deleted` with
    /// its original index so a later `reinsert`/`undelete` can restore it.
    /// Returns a clone of the removed value, or `None` if `id` isn't
    /// currently in `items`.
    pub fn remove(&mut self, id: ItemId) -> Option<E> {
        let pos = self.items.iter().position(|tr| tr.id() == id)?;
        let tr = self.items.remove(pos);
        let value = tr.current().clone();

        if matches!(tr.membership(), Some(Status::Added)) {
            tr.mark_unowned();
        } else {
            let original_index = self
                .original_snapshot
                .iter()
                .position(|&existing| existing == id)
                .unwrap_or(pos);
            tr.set_membership(Some(Status::Deleted));
            self.deleted.push((tr, original_index));
        }

        if let Some(callback) = &mut self.on_removal {
            callback(&value);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("item removed");

        Some(value)
    }

    /// Re-inserts a previously removed item at an arbitrary `index`,
    /// implementing §4.4's Insert step 2: cancels back to `Unchanged` if
    /// `index` matches the item's original index and its own internal
    /// status was already `Unchanged`; otherwise the item comes back as
    /// `Changed` (its own scalar mutations, if any, persist regardless).
    pub fn reinsert(&mut self, index: usize, id: ItemId) -> Result<(), Error> {
        let pos = self
            .deleted
            .iter()
            .position(|(tr, _)| tr.id() == id)
            .ok_or(Error::NotDeleted)?;
        let (tr, original_index) = self.deleted.remove(pos);
        let index = index.min(self.items.len());

        let cancels = original_index == index && tr.internal_status() == Status::Unchanged;
        tr.set_membership(if cancels { None } else { Some(Status::Changed) });

        if let Some(callback) = &mut self.on_insertion {
            callback(tr.current());
        }
        self.items.insert(index, tr);

        #[cfg(feature = "tracing")]
        tracing::debug!(index, cancels, "item reinserted");

        Ok(())
    }

    /// Restores a deleted item to its stored original index (clamped to
    /// the current length) and to whatever status its own internal state
    /// rolls up to — §4.4's Un-delete.
    pub fn undelete(&mut self, id: ItemId) -> Result<(), Error> {
        let pos = self
            .deleted
            .iter()
            .position(|(tr, _)| tr.id() == id)
            .ok_or(Error::NotDeleted)?;
        let (tr, original_index) = self.deleted.remove(pos);
        let index = original_index.min(self.items.len());

        tr.set_membership(None);
        if let Some(callback) = &mut self.on_insertion {
            callback(tr.current());
        }
        self.items.insert(index, tr);
        Ok(())
    }

    /// Indexer-set semantics: remove whatever is at `index`, then insert
    /// `value` there (§4.4).
    pub fn set_at(&mut self, index: usize, value: E) -> Option<E> {
        let id = self.items.get(index)?.id();
        let old = self.remove(id);
        self.insert(index, value);
        old
    }

    /// Items inserted since the last accept and not present in
    /// `original_snapshot`.
    pub fn added_items(&self) -> impl Iterator<Item = &TrackedRecord<E>> {
        self.items.iter().filter(|tr| matches!(tr.membership(), Some(Status::Added)))
    }

    /// Items whose rolled-up status is `Changed`.
    pub fn changed_items(&self) -> impl Iterator<Item = &TrackedRecord<E>> {
        self.items.iter().filter(|tr| tr.status() == Status::Changed)
    }

    /// Items whose rolled-up status is `Unchanged`.
    pub fn unchanged_items(&self) -> impl Iterator<Item = &TrackedRecord<E>> {
        self.items.iter().filter(|tr| tr.status() == Status::Unchanged)
    }

    /// Items removed since the last accept.
    pub fn deleted_items(&self) -> impl Iterator<Item = &TrackedRecord<E>> {
        self.deleted.iter().map(|(tr, _)| tr)
    }

    /// `true` if there is any added, changed, or deleted member.
    pub fn is_changed(&self) -> bool {
        !self.deleted.is_empty()
            || self.items.iter().any(|tr| tr.status() != Status::Unchanged)
    }

    /// Depth-first accept (C5): clear `deleted`, recurse into every
    /// remaining item (which normalizes its own membership and scalars),
    /// then retake `original_snapshot` from the now-accepted membership.
    pub fn accept_changes(&mut self) {
        for (tr, _) in self.deleted.drain(..) {
            tr.mark_unowned();
        }
        for tr in &mut self.items {
            tr.accept_changes();
        }
        self.original_snapshot = self.items.iter().map(TrackedRecord::id).collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(len = self.items.len(), "collection accepted");
    }

    /// Depth-first reject (C5): structural restoration first — reinsert
    /// every deleted item at its stored original index (ascending order),
    /// then drop every item that was only ever `Added` — followed by a
    /// recursive scalar-level reject on everything that remains.
    pub fn reject_changes(&mut self) {
        let mut deleted = core::mem::take(&mut self.deleted);
        deleted.sort_by_key(|(_, original_index)| *original_index);
        for (tr, original_index) in deleted {
            let index = original_index.min(self.items.len());
            self.items.insert(index, tr);
        }

        let mut index = 0;
        while index < self.items.len() {
            if matches!(self.items[index].membership(), Some(Status::Added)) {
                let tr = self.items.remove(index);
                tr.mark_unowned();
            } else {
                index += 1;
            }
        }

        for tr in &mut self.items {
            tr.reject_changes();
            tr.set_membership(None);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(len = self.items.len(), "collection rejected");
    }
}

impl<E: Trackable> AnyTracked for TrackedCollection<E> {
    fn status(&self) -> Status {
        if self.is_changed() {
            Status::Changed
        } else {
            Status::Unchanged
        }
    }

    fn accept_changes(&mut self) {
        TrackedCollection::accept_changes(self)
    }

    fn reject_changes(&mut self) {
        TrackedCollection::reject_changes(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{downcast_scalar, TrackedScalar};
    use crate::schema::{FieldKind, FieldSchema, Schema};

    #[derive(Clone, PartialEq, Debug)]
    struct Order {
        id: u32,
        c: String,
    }

    static ORDER_SCHEMA: Schema = Schema {
        fields: &[
            FieldSchema { name: "id", kind: FieldKind::Scalar },
            FieldSchema { name: "c", kind: FieldKind::Scalar },
        ],
    };

    impl Trackable for Order {
        fn schema() -> &'static Schema {
            &ORDER_SCHEMA
        }

        fn scalar_get(&self, field: &str) -> Box<dyn TrackedScalar> {
            match field {
                "id" => Box::new(self.id),
                "c" => Box::new(self.c.clone()),
                _ => unreachable!(),
            }
        }

        fn scalar_set(&mut self, field: &str, value: &dyn TrackedScalar) {
            match field {
                "id" => self.id = *downcast_scalar::<u32>(value),
                "c" => self.c = downcast_scalar::<String>(value).clone(),
                _ => unreachable!(),
            }
        }

        fn complex_wrap(&self, _field: &str, _cfg: TrackingConfig) -> Option<Box<dyn AnyTracked>> {
            None
        }

        fn complex_assign(&mut self, _field: &str, _wrapped: Option<&dyn AnyTracked>) {}

        fn collection_wrap(&self, _field: &str, _cfg: TrackingConfig) -> Box<dyn AnyTracked> {
            unreachable!()
        }

        fn collection_assign(&mut self, _field: &str, _wrapped: &dyn AnyTracked) {}
    }

    fn orders(n: u32) -> Vec<Order> {
        (0..n).map(|i| Order { id: i, c: format!("order-{i}") }).collect()
    }

    #[test]
    fn remove_then_reinsert_at_same_index_cancels() {
        let mut tc = TrackedCollection::track(orders(10)).unwrap();
        let id = tc.get(4).unwrap().id();

        tc.remove(id).unwrap();
        tc.reinsert(4, id).unwrap();

        let item = tc.get(4).unwrap();
        assert_eq!(item.status(), Status::Unchanged);
        assert_eq!(tc.deleted_items().count(), 0);
        assert!(!tc.is_changed());
    }

    #[test]
    fn remove_then_reinsert_at_different_index_on_mutated_item_is_changed() {
        let mut tc = TrackedCollection::track(orders(2)).unwrap();
        let id = tc.get(0).unwrap().id();

        tc.items[0].set("c", "12345".to_string());
        tc.remove(id).unwrap();
        tc.insert(tc.len(), Order { id: 0, c: "12345".to_string() });

        // A brand-new insert (not a reinsert-by-id) is Added, matching
        // §4.4: a caller that wants the "same mutated item moved to the
        // tail" scenario from the design must use `reinsert`, not `insert`.
        let moved_id = tc.get(tc.len() - 1).unwrap().id();
        assert_ne!(moved_id, id);

        // Demonstrate the actual scenario 3 from the design: reinsert the
        // original wrapper (carrying its mutation) at a different index.
        let mut tc = TrackedCollection::track(orders(2)).unwrap();
        let id = tc.get(0).unwrap().id();
        {
            let pos = tc.items.iter().position(|tr| tr.id() == id).unwrap();
            tc.items[pos].set("c", "12345".to_string());
        }
        tc.remove(id).unwrap();
        tc.reinsert(tc.len(), id).unwrap();

        let item = tc.items.iter().find(|tr| tr.id() == id).unwrap();
        assert_eq!(item.status(), Status::Changed);
        assert_eq!(tc.deleted_items().count(), 0);
    }

    #[test]
    fn reject_restores_deleted_to_original_index() {
        let mut tc = TrackedCollection::track(orders(10)).unwrap();
        let removed_id = tc.get(4).unwrap().id();
        tc.remove(removed_id).unwrap();

        tc.reject_changes();

        assert_eq!(tc.len(), 10);
        assert_eq!(tc.get(4).unwrap().id(), removed_id);
        assert!(!tc.is_changed());
    }

    #[test]
    fn added_item_removed_does_not_appear_in_deleted() {
        let mut tc = TrackedCollection::track(orders(1)).unwrap();
        let id = tc.insert(tc.len(), Order { id: 99, c: "new".into() });
        tc.remove(id).unwrap();
        assert_eq!(tc.deleted_items().count(), 0);
    }

    #[test]
    fn status_partitions_are_disjoint_and_exhaustive() {
        let mut tc = TrackedCollection::track(orders(3)).unwrap();
        tc.insert(tc.len(), Order { id: 10, c: "added".into() });
        let changed_id = tc.get(0).unwrap().id();
        {
            let pos = tc.items.iter().position(|tr| tr.id() == changed_id).unwrap();
            tc.items[pos].set("c", "edited".into());
        }

        let added: Vec<_> = tc.added_items().map(TrackedRecord::id).collect();
        let changed: Vec<_> = tc.changed_items().map(TrackedRecord::id).collect();
        let unchanged: Vec<_> = tc.unchanged_items().map(TrackedRecord::id).collect();

        for id in &added {
            assert!(!changed.contains(id));
        }
        assert_eq!(added.len() + changed.len() + unchanged.len(), tc.len());
    }

    #[test]
    fn track_existing_rejects_an_item_already_owned_elsewhere() {
        let tr = TrackedRecord::wrap(Order { id: 1, c: "x".into() });
        tr.mark_owned();
        assert_eq!(TrackedCollection::track_existing(vec![tr]).err(), Some(Error::AlreadyTracking));
    }

    #[test]
    fn track_boxed_slice_is_unsupported() {
        let boxed: Box<[Order]> = orders(2).into_boxed_slice();
        assert_eq!(TrackedCollection::<Order>::track_boxed_slice(boxed).err(), Some(Error::UnsupportedContainer));
    }

    #[test]
    fn reinsert_of_an_unknown_id_is_not_deleted() {
        let mut tc = TrackedCollection::track(orders(3)).unwrap();
        let other = TrackedCollection::track(orders(1)).unwrap();
        let unknown_id = other.get(0).unwrap().id();

        assert_eq!(tc.reinsert(0, unknown_id).err(), Some(Error::NotDeleted));
    }

    #[test]
    fn undelete_of_an_unknown_id_is_not_deleted() {
        let mut tc = TrackedCollection::track(orders(3)).unwrap();
        let other = TrackedCollection::track(orders(1)).unwrap();
        let unknown_id = other.get(0).unwrap().id();

        assert_eq!(tc.undelete(unknown_id).err(), Some(Error::NotDeleted));
    }

    #[test]
    fn on_insertion_and_on_removal_fire_once_per_mutation() {
        use std::sync::{Arc, Mutex};

        let mut tc = TrackedCollection::track(orders(2)).unwrap();
        let inserted: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let removed: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        {
            let inserted = Arc::clone(&inserted);
            tc.on_insertion(move |order: &Order| inserted.lock().unwrap().push(order.id));
        }
        {
            let removed = Arc::clone(&removed);
            tc.on_removal(move |order: &Order| removed.lock().unwrap().push(order.id));
        }

        let new_id = tc.insert(tc.len(), Order { id: 99, c: "new".into() });
        assert_eq!(*inserted.lock().unwrap(), vec![99]);
        assert!(removed.lock().unwrap().is_empty());

        tc.remove(new_id);
        assert_eq!(*removed.lock().unwrap(), vec![99]);
        assert_eq!(inserted.lock().unwrap().len(), 1);

        let kept_id = tc.get(0).unwrap().id();
        tc.remove(kept_id);
        assert_eq!(*removed.lock().unwrap(), vec![99, 0]);

        tc.reinsert(0, kept_id).unwrap();
        assert_eq!(*inserted.lock().unwrap(), vec![99, 0]);

        tc.remove(kept_id);
        assert_eq!(*removed.lock().unwrap(), vec![99, 0, 0]);

        tc.undelete(kept_id).unwrap();
        assert_eq!(*inserted.lock().unwrap(), vec![99, 0, 0]);
    }
}
