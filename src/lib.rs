#![deny(bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Change-tracking wrappers for plain record types and collections.
//!
//! `trackable` wraps an owned value and remembers what it looked like when
//! tracking started, so later you can ask what changed, accept the current
//! state as the new baseline, or revert to the original. It covers three
//! shapes of data:
//!
//! - scalar properties, compared by `PartialEq` ([`TrackedRecord`]'s
//!   `original` map),
//! - complex (nested record) properties, wrapped lazily into their own
//!   [`TrackedRecord`],
//! - collections (`Vec<E>`), wrapped lazily into a [`TrackedCollection`]
//!   that tracks membership (added/changed/deleted/unchanged) alongside
//!   each element's own change state.
//!
//! `#[derive(Trackable)]` generates the compile-time [`Schema`] and
//! accessor glue a record type needs to participate; see [`schema`] for
//! the trait it implements.

pub mod any_tracked;
pub mod collection;
pub mod error;
pub mod record;
pub mod scalar;
pub mod schema;
pub mod status;

pub mod prelude;

pub use any_tracked::AnyTracked;
pub use collection::TrackedCollection;
pub use error::Error;
pub use record::{ItemId, TrackedRecord};
pub use scalar::TrackedScalar;
pub use schema::{FieldKind, FieldSchema, Schema, Trackable, TrackingConfig};
pub use status::Status;

#[cfg(feature = "derive")]
#[cfg_attr(docsrs, doc(cfg(feature = "derive")))]
pub use trackable_derive::Trackable;

/// Alias for `Result<T, Error>`, matching every fallible signature in this
/// crate.
pub type Result<T> = core::result::Result<T, Error>;
