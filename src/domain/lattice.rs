//! Lattice traits shared by every abstract domain.
//!
//! An abstract domain over-approximates a set of concrete values. The interpreter only
//! needs a handful of capabilities from it, split across two traits:
//!
//! - [`Domain`]: the capability set every abstract value has (deep clone, structural
//!   equality, in-place join, footprint estimate, rendering)
//! - [`AccuracyValue`]: the optional precision interface of domains that can represent
//!   "nothing" and "everything" explicitly
//!
//! # Lattice Theory Background
//!
//! - **Join (∨)**: Least upper bound, computed in place by [`Domain::merge`]
//! - **Top (⊤)**: Every concrete value is possible
//! - **Bottom (⊥)**: No concrete value is possible (unreached code, contradiction)
//! - **Widening (∇)**: An upper bound that also guarantees termination on domains of
//!   large height
//!
//! `merge` must be idempotent, commutative and associative, and it never increases
//! accuracy: `merge(a, b).accuracy() <= min(a.accuracy(), b.accuracy())`.

use std::fmt::{Debug, Display};

/// The capability set every abstract value implements.
///
/// Values are owned by exactly one state slot. `Clone` is a deep copy, so merging into a
/// value never affects another state.
pub trait Domain: Clone + Debug + Display + PartialEq {
    /// Joins `other` into `self` in place.
    ///
    /// # Panics
    ///
    /// Implementations abort the analysis when the two values cannot describe the same
    /// kind of concrete data (different widths, different pointer identities, ...).
    fn merge(&mut self, other: &Self);

    /// Joins `other` into `self`, jumping over intermediate lattice elements where the
    /// domain has a large height.
    ///
    /// `self` is the value from the previous iteration. The default is a plain join,
    /// which is already terminating for finite-height domains.
    fn widen(&mut self, other: &Self) {
        self.merge(other);
    }

    /// Rough estimate of the heap and inline bytes used by the value.
    fn memory_usage(&self) -> usize;

    /// Returns the join of `self` and `other` as a new value.
    #[must_use]
    fn joined(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

/// Precision interface of domains with explicit top and bottom elements.
///
/// The accuracy score is monotone in the lattice order: `1.0` for bottom and for a single
/// concrete value, `0.0` for top.
pub trait AccuracyValue {
    /// Accuracy in `[0, 1]`.
    fn accuracy(&self) -> f32;

    /// Returns `true` if no concrete value is represented.
    fn is_bottom(&self) -> bool;

    /// Makes the value represent no concrete value.
    fn set_bottom(&mut self);

    /// Returns `true` if every concrete value of the type is represented.
    fn is_top(&self) -> bool;

    /// Makes the value represent every concrete value of the type.
    fn set_top(&mut self);
}

#[cfg(test)]
pub(crate) mod laws {
    //! Reusable checks of the lattice laws, driven by the property tests of each domain.

    use super::{AccuracyValue, Domain};

    pub fn check_idempotent<T: Domain>(a: &T) {
        assert_eq!(&a.joined(a), a);
    }

    pub fn check_commutative<T: Domain>(a: &T, b: &T) {
        assert_eq!(a.joined(b), b.joined(a));
    }

    pub fn check_associative<T: Domain>(a: &T, b: &T, c: &T) {
        assert_eq!(a.joined(b).joined(c), a.joined(&b.joined(c)));
    }

    pub fn check_monotone<T: Domain + AccuracyValue>(a: &T, b: &T) {
        let joined = a.joined(b);
        let bound = a.accuracy().min(b.accuracy());
        assert!(
            joined.accuracy() <= bound + f32::EPSILON,
            "{joined} is more accurate than {a} and {b}"
        );
    }
}
