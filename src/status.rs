//! The status lattice shared by tracked records and tracked collection
//! members.

use core::fmt;

/// Where a tracked value stands relative to its last accepted snapshot.
///
/// `Unchanged` and `Changed` form a small lattice used for rollup:
/// `Unchanged ⊑ Changed`. `Added` and `Deleted` are leaf states — they
/// describe a record's *membership* inside a particular tracked collection
/// and never roll up into a parent's own status the way `Changed` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No scalar differs from its snapshot, no complex child is changed, and
    /// no collection child reports `is_changed`.
    Unchanged,
    /// The record was inserted into a tracked collection since the last
    /// accept and was not present in the collection's original snapshot.
    Added,
    /// At least one scalar differs from its snapshot, or a complex child is
    /// `Changed`, or a collection child's `is_changed()` is `true`.
    Changed,
    /// The record was removed from a tracked collection it originally
    /// belonged to, and sits in that collection's `deleted` set.
    Deleted,
}

impl Status {
    /// `true` for every status except `Unchanged`.
    #[inline]
    pub fn is_changed(self) -> bool {
        !matches!(self, Status::Unchanged)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Unchanged => "Unchanged",
            Status::Added => "Added",
            Status::Changed => "Changed",
            Status::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}
