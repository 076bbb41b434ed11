//! Type-erased scalar values.
//!
//! The engine needs to hold a tracked record's pre-mutation scalar values in
//! a single `HashMap<&'static str, _>` even though different fields have
//! different concrete types. [`TrackedScalar`] is the small object-safe
//! abstraction that makes that possible: a blanket impl covers every
//! `PartialEq + Clone` type, so `#[derive(Trackable)]` never has to know the
//! field types up front, only that each one satisfies the bound.

use core::any::Any;
use core::fmt;

/// A scalar property value, boxed so it can live in a schema-agnostic map.
pub trait TrackedScalar: Any + Send + Sync {
    /// Equality against another boxed scalar of (expected to be) the same
    /// concrete type. Returns `false`, rather than panicking, if the
    /// concrete types differ — that can only happen if the generated code
    /// has a bug, and silently treating it as "different" is safer than
    /// panicking deep inside status computation.
    fn scalar_eq(&self, other: &dyn TrackedScalar) -> bool;

    /// Clones the underlying value into a new box.
    fn clone_boxed(&self) -> Box<dyn TrackedScalar>;

    /// Upcast for [`core::any::Any::downcast_ref`].
    fn as_any(&self) -> &dyn Any;
}

impl<T> TrackedScalar for T
where
    T: Any + PartialEq + Clone + Send + Sync,
{
    fn scalar_eq(&self, other: &dyn TrackedScalar) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn clone_boxed(&self) -> Box<dyn TrackedScalar> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for dyn TrackedScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TrackedScalar { .. }")
    }
}

/// Downcasts a boxed scalar to a concrete `&T`, panicking on a schema bug.
///
/// Callers only ever invoke this with the type the schema says `field`
/// holds, so a mismatch means `#[derive(Trackable)]` generated inconsistent
/// code, not a user error — hence the panic rather than a recoverable
/// `Error` variant.
pub fn downcast_scalar<T: 'static>(value: &dyn TrackedScalar) -> &T {
    value
        .as_any()
        .downcast_ref::<T>()
        .expect("scalar field type mismatch: derive(Trackable) generated inconsistent accessors")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_scalars_compare_by_value() {
        let a: Box<dyn TrackedScalar> = Box::new(1_u32);
        let b: Box<dyn TrackedScalar> = Box::new(1_u32);
        let c: Box<dyn TrackedScalar> = Box::new(2_u32);
        assert!(a.scalar_eq(&*b));
        assert!(!a.scalar_eq(&*c));
    }

    #[test]
    fn mismatched_concrete_types_are_unequal_not_panicking() {
        let a: Box<dyn TrackedScalar> = Box::new(1_u32);
        let b: Box<dyn TrackedScalar> = Box::new("one".to_string());
        assert!(!a.scalar_eq(&*b));
    }

    #[test]
    fn clone_boxed_preserves_value() {
        let a: Box<dyn TrackedScalar> = Box::new(42_i64);
        let cloned = a.clone_boxed();
        assert!(a.scalar_eq(&*cloned));
        assert_eq!(*downcast_scalar::<i64>(&*cloned), 42);
    }
}
