//! Convenience re-exports for consumers: `use trackable::prelude::*;`.

pub use crate::any_tracked::AnyTracked;
pub use crate::collection::TrackedCollection;
pub use crate::error::Error;
pub use crate::record::{ItemId, TrackedRecord};
pub use crate::scalar::TrackedScalar;
pub use crate::schema::{Schema, Trackable, TrackingConfig};
pub use crate::status::Status;

#[cfg(feature = "derive")]
pub use trackable_derive::Trackable;
