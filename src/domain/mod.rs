//! Abstract domains.
//!
//! This module contains every abstraction the interpreter computes with, leaves first:
//!
//! - [`ApInt`] - concrete fixed-width integers with overflow-reporting arithmetic
//! - [`Bits`], [`Enumeration`], [`Range`] - the numeric sub-domains over integers
//! - [`Container`] - the reduced product of the three numeric sub-domains
//! - [`FloatRange`] - interval abstraction of floating-point values
//! - [`InclusionBased`] - inclusion-based points-to abstraction of pointers
//! - [`Array`] - aggregate abstraction consumed by pointer dereferences
//! - [`Value`] - the closed set of abstract values a state slot can hold
//!
//! All domains implement [`Domain`]; the numeric ones and [`FloatRange`] also implement
//! [`AccuracyValue`].

pub mod apint;
mod array;
mod bits;
mod container;
mod enumeration;
mod float;
mod lattice;
mod pointer;
mod range;
mod value;

pub use apint::ApInt;
pub use array::{Array, EXACT_ARRAY_LIMIT};
pub use bits::Bits;
pub use container::{Container, IntegerOperand};
pub use enumeration::{Enumeration, ENUMERATION_LIMIT};
pub use float::FloatRange;
pub use lattice::{AccuracyValue, Domain};
pub use pointer::{InclusionBased, Target};
pub use range::Range;
pub use value::Value;

use crate::ir::IntPredicate;

/// Decides an integer comparison from the bounds of two operands.
///
/// `a` and `b` are `(min, max)` pairs read with the ordering selected by `signed`. The
/// result is definite only when every element of `a` relates to every element of `b` the
/// same way; otherwise `None`.
pub(crate) fn compare_bounds(
    predicate: IntPredicate,
    signed: bool,
    a: (ApInt, ApInt),
    b: (ApInt, ApInt),
) -> Option<bool> {
    let lt = |x: &ApInt, y: &ApInt| if signed { x.slt(y) } else { x.ult(y) };
    let le = |x: &ApInt, y: &ApInt| if signed { x.sle(y) } else { x.ule(y) };
    let less = |(a_min, a_max): (ApInt, ApInt), (b_min, b_max): (ApInt, ApInt)| {
        if lt(&a_max, &b_min) {
            Some(true)
        } else if le(&b_max, &a_min) {
            Some(false)
        } else {
            None
        }
    };
    let less_equal = |(a_min, a_max): (ApInt, ApInt), (b_min, b_max): (ApInt, ApInt)| {
        if le(&a_max, &b_min) {
            Some(true)
        } else if lt(&b_max, &a_min) {
            Some(false)
        } else {
            None
        }
    };
    let equal = || {
        if a.0 == a.1 && b.0 == b.1 && a.0 == b.0 {
            Some(true)
        } else if lt(&a.1, &b.0) || lt(&b.1, &a.0) {
            Some(false)
        } else {
            None
        }
    };

    match predicate {
        IntPredicate::Eq => equal(),
        IntPredicate::Ne => equal().map(|e| !e),
        IntPredicate::Ult | IntPredicate::Slt => less(a, b),
        IntPredicate::Ule | IntPredicate::Sle => less_equal(a, b),
        IntPredicate::Ugt | IntPredicate::Sgt => less(b, a),
        IntPredicate::Uge | IntPredicate::Sge => less_equal(b, a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(min: u64, max: u64) -> (ApInt, ApInt) {
        (ApInt::new(8, min), ApInt::new(8, max))
    }

    #[test]
    fn test_compare_bounds() {
        assert_eq!(
            compare_bounds(IntPredicate::Ult, false, pair(1, 2), pair(3, 4)),
            Some(true)
        );
        assert_eq!(
            compare_bounds(IntPredicate::Uge, false, pair(1, 2), pair(3, 4)),
            Some(false)
        );
        assert_eq!(
            compare_bounds(IntPredicate::Ule, false, pair(1, 3), pair(3, 4)),
            Some(true)
        );
        assert_eq!(
            compare_bounds(IntPredicate::Ult, false, pair(1, 3), pair(3, 4)),
            None
        );
        assert_eq!(
            compare_bounds(IntPredicate::Eq, false, pair(7, 7), pair(7, 7)),
            Some(true)
        );
        assert_eq!(
            compare_bounds(IntPredicate::Ne, false, pair(1, 2), pair(3, 4)),
            Some(true)
        );
        // 0xff is -1 under the signed reading
        assert_eq!(
            compare_bounds(IntPredicate::Slt, true, pair(0xff, 0xff), pair(0, 0)),
            Some(true)
        );
    }
}
