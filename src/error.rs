//! All error types.

use core::fmt::{Debug, Display, Formatter};
#[cfg(feature = "std")]
use std::error::Error as StdError;

/// Errors produced by the tracking engine.
///
/// Every variant is surfaced to the caller immediately; none are retried
/// internally. Status computation itself never fails — it is total over any
/// valid wrapper state.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Attempted to wrap an object or sequence that already holds tracking
    /// state.
    AlreadyTracking,
    /// Attempted to track a container shape that cannot express
    /// insert/remove (e.g. a fixed-size array).
    UnsupportedContainer,
    /// Attempted to extract a tracking interface from a non-tracked value.
    InvalidCast,
    /// `undelete` was applied to an item not currently in the deleted set.
    NotDeleted,
    /// The record's structure is not eligible for tracking (e.g. a cycle
    /// was detected while wrapping).
    SchemaIneligible,
}

#[cfg(feature = "std")]
impl StdError for Error {}

impl Debug for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            Self::AlreadyTracking => {
                fmt.write_str("Cannot wrap a value that is already under tracking.")
            }
            Self::UnsupportedContainer => fmt.write_str(
                "Cannot track this container shape, it does not support insert/remove.",
            ),
            Self::InvalidCast => {
                fmt.write_str("Cannot borrow a tracking interface from a value that isn't tracked.")
            }
            Self::NotDeleted => fmt.write_str("This item is not in the deleted set."),
            Self::SchemaIneligible => {
                fmt.write_str("This record's structure is not eligible for tracking.")
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        Debug::fmt(self, fmt)
    }
}
