//! Tracked records (C2 Scalar Tracker + C3 Complex-Property Tracker).

use core::any::Any;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use hashbrown::HashMap;

use crate::any_tracked::{self, AnyTracked};
use crate::error::Error;
use crate::scalar::{downcast_scalar, TrackedScalar};
use crate::schema::{FieldKind, Trackable, TrackingConfig};
use crate::status::Status;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity for a tracked record, used by [`crate::collection::TrackedCollection`]
/// to tell "the same wrapper, possibly moved" apart from "a newly inserted
/// value with equal fields". Rust's value semantics mean two records with
/// identical scalar contents are still distinct tracked instances; `ItemId`
/// is the substitute for the reference-identity the original design relies
/// on (see `DESIGN.md`, grounded on `entity_id::EntityId`'s role as a
/// stable handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u64);

impl ItemId {
    fn fresh() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

fn encode_membership(status: Option<Status>) -> u8 {
    match status {
        None => 0,
        Some(Status::Added) => 1,
        Some(Status::Changed) => 2,
        Some(Status::Deleted) => 3,
        Some(Status::Unchanged) => 0,
    }
}

fn decode_membership(value: u8) -> Option<Status> {
    match value {
        1 => Some(Status::Added),
        2 => Some(Status::Changed),
        3 => Some(Status::Deleted),
        _ => None,
    }
}

/// A tracked wrapper around a single record (`TR<R>` in the design).
///
/// Holds the record's current value, a first-write-wins snapshot of its
/// pre-mutation scalars, and lazily-populated tracked children for its
/// complex and collection properties.
pub struct TrackedRecord<R: Trackable> {
    id: ItemId,
    current: R,
    original_scalars: HashMap<&'static str, Box<dyn TrackedScalar>>,
    // `None` means "known to be null", absence of the key means "not yet
    // accessed" — the slot invariant in §4.3 depends on this distinction.
    complex_children: Mutex<HashMap<&'static str, Option<Box<dyn AnyTracked>>>>,
    collection_children: Mutex<HashMap<&'static str, Box<dyn AnyTracked>>>,
    complex_latched: bool,
    cfg: TrackingConfig,
    // Encoded `Option<Status>`: the membership a parent `TrackedCollection`
    // has imposed (Added/Deleted/forced-Changed), or "none" meaning
    // `status()` should fall back to the internally rolled-up value.
    // An atomic rather than a `Cell` so `TrackedRecord` stays `Sync` —
    // the caller is still responsible for serializing real mutation, per §5.
    membership: AtomicU8,
    // Set once this record is living inside some `TrackedCollection`'s
    // `items`/`deleted`. Used only to reject re-wrapping an
    // already-tracked sequence (`Error::AlreadyTracking`).
    owned: AtomicBool,
}

impl<R: Trackable> TrackedRecord<R> {
    /// Wraps a plain record with the default [`TrackingConfig`].
    pub fn wrap(value: R) -> Self {
        Self::wrap_with_config(value, TrackingConfig::default())
    }

    /// Wraps a plain record, propagating `cfg` to any lazily-wrapped
    /// descendant.
    pub fn wrap_with_config(value: R, cfg: TrackingConfig) -> Self {
        #[cfg(feature = "tracing")]
        tracing::trace!(field_count = R::schema().fields.len(), "wrapping record");

        TrackedRecord {
            id: ItemId::fresh(),
            current: value,
            original_scalars: HashMap::new(),
            complex_children: Mutex::new(HashMap::new()),
            collection_children: Mutex::new(HashMap::new()),
            complex_latched: false,
            cfg,
            membership: AtomicU8::new(0),
            owned: AtomicBool::new(false),
        }
    }

    /// This record's stable identity.
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub(crate) fn mark_owned(&self) {
        self.owned.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_unowned(&self) {
        self.owned.store(false, Ordering::Relaxed);
    }

    pub(crate) fn is_owned(&self) -> bool {
        self.owned.load(Ordering::Relaxed)
    }

    pub(crate) fn set_membership(&self, status: Option<Status>) {
        self.membership.store(encode_membership(status), Ordering::Relaxed);
    }

    pub(crate) fn membership(&self) -> Option<Status> {
        decode_membership(self.membership.load(Ordering::Relaxed))
    }

    /// Read-only access to the wrapped record's current value.
    ///
    /// Complex and collection fields are only current here up to the last
    /// [`TrackedRecord::sync_into_current`] call (performed automatically
    /// by `accept_changes`, `reject_changes`, and `original_snapshot`);
    /// prefer [`TrackedRecord::complex`] / [`TrackedRecord::collection`] for
    /// live nested access, since mutating directly through `current` would
    /// bypass scalar tracking entirely (§5).
    pub fn current(&self) -> &R {
        &self.current
    }

    /// Reads a scalar field's current value.
    pub fn get<T: Clone + 'static>(&self, field: &str) -> T {
        let boxed = self.current.scalar_get(field);
        downcast_scalar::<T>(&*boxed).clone()
    }

    /// Sets a scalar field, per the C2 algorithm: the prior value is
    /// snapshotted into `original` on first write only, and the snapshot is
    /// cleared again if the new value happens to equal it — the mechanism
    /// by which a Changed record can decay back to Unchanged without an
    /// explicit reject.
    pub fn set<T>(&mut self, field: &str, value: T)
    where
        T: TrackedScalar + Clone + 'static,
    {
        if !self.original_scalars.contains_key(field) {
            let prior = self.current.scalar_get(field);
            self.original_scalars.insert(field, prior);
        }

        self.current.scalar_set(field, &value);

        if let Some(orig) = self.original_scalars.get(field) {
            if orig.scalar_eq(&value) {
                self.original_scalars.remove(field);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(field, status = %self.status(), "scalar set");
    }

    /// The pre-mutation value of `field`, or its current value if `field`
    /// hasn't been touched since the last accept/reject.
    pub fn original<T: Clone + 'static>(&self, field: &str) -> T {
        match self.original_scalars.get(field) {
            Some(value) => downcast_scalar::<T>(&**value).clone(),
            None => self.get(field),
        }
    }

    /// Reconstructs a plain `R` with every scalar reverted to its
    /// pre-mutation value (nested complex/collection fields reflect
    /// whatever was last synced — see [`TrackedRecord::current`]).
    pub fn original_snapshot(&self) -> R {
        let mut snapshot = self.current.clone();
        for (field, value) in &self.original_scalars {
            snapshot.scalar_set(field, &**value);
        }
        snapshot
    }

    fn schema_kind(&self, field: &str) -> Option<FieldKind> {
        R::schema().kind_of(field)
    }

    pub(crate) fn internal_status(&self) -> Status {
        if !self.original_scalars.is_empty() {
            return Status::Changed;
        }

        let complex_changed = {
            let map = self
                .complex_children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.values().any(|slot| matches!(slot, Some(child) if child.is_changed()))
        };
        if complex_changed {
            return Status::Changed;
        }

        let collection_changed = {
            let map = self
                .collection_children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.values().any(|child| child.is_changed())
        };
        if collection_changed {
            return Status::Changed;
        }

        Status::Unchanged
    }

    /// This record's status, per §3: whatever membership a parent
    /// collection has imposed (`Added`/`Deleted`/a forced `Changed`), or
    /// else the internally rolled-up `Unchanged`/`Changed`.
    pub fn status(&self) -> Status {
        self.membership().unwrap_or_else(|| self.internal_status())
    }

    /// Ensures `field`'s tracked child slot is populated, without handing
    /// out a reference — used both by [`TrackedRecord::complex`] and by the
    /// read-only status rollup, which only ever needs to know whether a
    /// slot is changed, not to hold onto it. Uses the runtime lock, since it
    /// may run through a shared `&self`: concurrent first-reads of the same
    /// slot must not race to create two wrappers (§5).
    fn ensure_complex_wrapped_shared(&self, field: &str) -> Result<(), Error> {
        if self.schema_kind(field) != Some(FieldKind::Complex) {
            return Err(Error::InvalidCast);
        }
        let mut map = self
            .complex_children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !map.contains_key(field) {
            if !self.cfg.make_complex_trackable {
                return Err(Error::SchemaIneligible);
            }
            let wrapped = self.current.complex_wrap(field, self.cfg);
            map.insert(field, wrapped);
        }
        Ok(())
    }

    /// Borrows (lazily wrapping on first access) the tracked child for a
    /// complex field, or `None` if the field currently holds no value.
    pub fn complex<C: Trackable>(&mut self, field: &str) -> Result<Option<&mut TrackedRecord<C>>, Error> {
        self.ensure_complex_wrapped_shared(field)?;
        let map = self
            .complex_children
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match map.get_mut(field) {
            Some(Some(wrapped)) => Ok(Some(any_tracked::downcast_mut::<TrackedRecord<C>>(wrapped.as_mut())?)),
            Some(None) => Ok(None),
            None => unreachable!("ensure_complex_wrapped_shared always populates the slot"),
        }
    }

    /// Replaces a complex field's value, per the C3 write algorithm: the
    /// underlying assignment is applied first (synchronous, unconditional
    /// visibility to external observers), then the cached wrapper is
    /// replaced to match.
    pub fn set_complex<C: Trackable>(&mut self, field: &str, value: Option<C>) -> Result<(), Error> {
        if self.schema_kind(field) != Some(FieldKind::Complex) {
            return Err(Error::InvalidCast);
        }

        let wrapped = value.map(|v| TrackedRecord::wrap_with_config(v, self.cfg));
        self.current
            .complex_assign(field, wrapped.as_ref().map(|w| w as &dyn AnyTracked));

        let map = self
            .complex_children
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(field, wrapped.map(|w| Box::new(w) as Box<dyn AnyTracked>));
        Ok(())
    }

    /// Borrows (lazily wrapping on first access) the tracked collection for
    /// a collection field.
    pub fn collection<E: Trackable>(&mut self, field: &str) -> Result<&mut crate::collection::TrackedCollection<E>, Error> {
        if self.schema_kind(field) != Some(FieldKind::Collection) {
            return Err(Error::InvalidCast);
        }
        {
            let mut map = self
                .collection_children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !map.contains_key(field) {
                if !self.cfg.make_collection_trackable {
                    return Err(Error::SchemaIneligible);
                }
                let wrapped = self.current.collection_wrap(field, self.cfg);
                map.insert(field, wrapped);
            }
        }
        let map = self
            .collection_children
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        any_tracked::downcast_mut::<crate::collection::TrackedCollection<E>>(map.get_mut(field).unwrap().as_mut())
    }

    /// Materializes every currently-non-null complex child and returns them
    /// for uniform recursion (`complex_property_trackables` in the design).
    /// Latches once: later calls do not re-scan for properties that became
    /// non-null afterward (§9 open question, resolved in favor of
    /// latch-once semantics).
    pub fn complex_children(&mut self) -> impl Iterator<Item = &mut dyn AnyTracked> {
        if !self.complex_latched {
            self.complex_latched = true;
            let names: Vec<&'static str> = R::schema().complex().collect();
            for name in names {
                let _ = self.ensure_complex_wrapped_shared(name);
            }
        }
        self.complex_children
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values_mut()
            .filter_map(|slot| slot.as_mut().map(|child| child.as_mut()))
    }

    /// Pushes every wrapped complex/collection child's current value back
    /// into the underlying record, recursively. Called automatically by
    /// `accept_changes`, `reject_changes`, and `original_snapshot` callers
    /// that need a fully up to date `R`.
    pub fn sync_into_current(&mut self) {
        let complex_names: Vec<&'static str> = R::schema().complex().collect();
        for field in complex_names {
            let mut map = self
                .complex_children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(slot) = map.get_mut(field) {
                let wrapped_ref = slot.as_deref().map(|child| child as &dyn AnyTracked);
                self.current.complex_assign(field, wrapped_ref);
            }
        }

        let collection_names: Vec<&'static str> = R::schema().collections().collect();
        for field in collection_names {
            let mut map = self
                .collection_children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(child) = map.get_mut(field) {
                self.current.collection_assign(field, child.as_ref());
            }
        }
    }

    /// Depth-first accept (C5): recurse into children first so their
    /// rolled-up `Unchanged` status is observable, then clear this
    /// record's own scalar snapshot and membership.
    pub fn accept_changes(&mut self) {
        {
            let mut map = self
                .complex_children
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for child in map.values_mut().flatten() {
                child.accept_changes();
            }
        }
        {
            let mut map = self
                .collection_children
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for child in map.values_mut() {
                child.accept_changes();
            }
        }
        self.sync_into_current();
        self.original_scalars.clear();
        self.set_membership(None);

        #[cfg(feature = "tracing")]
        tracing::debug!("accepted changes");
    }

    /// Depth-first reject (C5): restore scalars first, then recurse into
    /// children — membership itself is restored by the owning
    /// `TrackedCollection`, not here.
    pub fn reject_changes(&mut self) {
        for (field, value) in self.original_scalars.drain() {
            self.current.scalar_set(field, &*value);
        }
        {
            let mut map = self
                .complex_children
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for child in map.values_mut().flatten() {
                child.reject_changes();
            }
        }
        {
            let mut map = self
                .collection_children
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for child in map.values_mut() {
                child.reject_changes();
            }
        }
        self.sync_into_current();

        #[cfg(feature = "tracing")]
        tracing::debug!("rejected changes");
    }

}

impl<R: Trackable> AnyTracked for TrackedRecord<R> {
    fn status(&self) -> Status {
        TrackedRecord::status(self)
    }

    fn accept_changes(&mut self) {
        TrackedRecord::accept_changes(self)
    }

    fn reject_changes(&mut self) {
        TrackedRecord::reject_changes(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
