//! Compile-time schema introspection (C1).
//!
//! The original design enumerates a record's properties through runtime
//! reflection. Rust has none, so `#[derive(Trackable)]`
//! (`trackable_derive`) plays that role at compile time: for every field it
//! decides whether the field is scalar, complex, or a collection, and emits
//! a `'static` [`Schema`] plus the accessor thunks [`Trackable`] requires.
//! There is no process-wide mutable action table — every generated
//! `Schema` is a `const` owned by the type it describes.

use crate::any_tracked::AnyTracked;
use crate::scalar::TrackedScalar;

/// How a single field was classified by the derive macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A `PartialEq + Clone` leaf value, tracked by [`crate::record::TrackedRecord`]'s
    /// `original` map.
    Scalar,
    /// A nested record type, itself `Trackable`, lazily wrapped on first
    /// access.
    Complex,
    /// A `Vec<E>` of `Trackable` elements, lazily wrapped into a
    /// [`crate::collection::TrackedCollection`] on first access.
    Collection,
}

/// Static description of one field, as emitted by `#[derive(Trackable)]`.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    /// The field's name, used as the key throughout the tracking maps.
    pub name: &'static str,
    /// The field's classification.
    pub kind: FieldKind,
}

/// The full schema of a record type: every field the derive macro saw,
/// in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// All fields, scalar, complex, and collection alike.
    pub fields: &'static [FieldSchema],
}

impl Schema {
    /// Names of the scalar fields — `scalars(R)` in the design.
    pub fn scalars(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Scalar)
            .map(|f| f.name)
    }

    /// Names of the complex fields — `complex(R)` in the design.
    pub fn complex(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Complex)
            .map(|f| f.name)
    }

    /// Names of the collection fields — `collections(R)` in the design.
    pub fn collections(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Collection)
            .map(|f| f.name)
    }

    /// Looks up a field's kind by name.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }
}

/// Flags inherited while recursively wrapping a graph, per §4.7.
///
/// Setting either flag to `false` for a subtree exposes that subtree's
/// complex/collection properties as plain passthrough values: no wrapper,
/// no status, no accept/reject participation. Both default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Whether complex (nested record) properties get lazily wrapped.
    pub make_complex_trackable: bool,
    /// Whether collection properties get lazily wrapped.
    pub make_collection_trackable: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            make_complex_trackable: true,
            make_collection_trackable: true,
        }
    }
}

/// Implemented by `#[derive(Trackable)]` for every record type the engine
/// wraps.
///
/// Field types vary from one implementor to the next, so every accessor
/// is type-erased: scalars travel as `Box<dyn TrackedScalar>`, complex and
/// collection children travel as `Box<dyn AnyTracked>`. The generated
/// bodies are a `match field { ... }` over the struct's own field names;
/// callers always pass a name the `schema()` actually lists.
pub trait Trackable: Clone + Send + Sync + 'static {
    /// The compile-time schema for this type.
    fn schema() -> &'static Schema;

    /// Reads a scalar field's current value.
    fn scalar_get(&self, field: &str) -> Box<dyn TrackedScalar>;

    /// Writes a scalar field's current value.
    fn scalar_set(&mut self, field: &str, value: &dyn TrackedScalar);

    /// Wraps a complex field's current value into a fresh tracked child,
    /// or returns `None` if the field is currently absent (an `Option<C>`
    /// field holding `None`).
    fn complex_wrap(&self, field: &str, cfg: TrackingConfig) -> Option<Box<dyn AnyTracked>>;

    /// Applies a complex child's current value back into the field after a
    /// `set`, or clears the field if `wrapped` is `None`.
    fn complex_assign(&mut self, field: &str, wrapped: Option<&dyn AnyTracked>);

    /// Wraps a collection field's current value into a fresh tracked
    /// collection.
    fn collection_wrap(&self, field: &str, cfg: TrackingConfig) -> Box<dyn AnyTracked>;

    /// Applies a collection child's current items back into the field.
    fn collection_assign(&mut self, field: &str, wrapped: &dyn AnyTracked);
}
