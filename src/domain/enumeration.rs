//! Explicit value-set abstraction.
//!
//! An [`Enumeration`] lists every concrete value a variable may hold, up to
//! [`ENUMERATION_LIMIT`] members. Operations compute the cross product of their operands
//! and apply the concrete machine operation to every pair. A result that would be larger
//! than the limit, or that involves an undefined concrete operation (division by zero,
//! signed division overflow, over-wide shift), collapses to top.

use std::{collections::BTreeSet, fmt};

use crate::{
    domain::{apint::check_supported_width, AccuracyValue, ApInt, Domain},
    ir::IntPredicate,
};

/// Maximum number of members before an enumeration collapses to top.
pub const ENUMERATION_LIMIT: usize = 40;

/// Bounded set of concrete values.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Enumeration {
    width: u32,
    values: BTreeSet<ApInt>,
    top: bool,
}

impl Enumeration {
    /// The empty set.
    #[must_use]
    pub fn bottom(width: u32) -> Self {
        check_supported_width(width);
        Self {
            width,
            values: BTreeSet::new(),
            top: false,
        }
    }

    /// Every value of the width.
    #[must_use]
    pub fn top(width: u32) -> Self {
        check_supported_width(width);
        Self {
            width,
            values: BTreeSet::new(),
            top: true,
        }
    }

    /// A singleton set.
    #[must_use]
    pub fn from_constant(value: &ApInt) -> Self {
        let mut result = Self::bottom(value.width());
        result.values.insert(*value);
        result
    }

    /// Builds a set from values, collapsing to top above the limit.
    ///
    /// # Panics
    ///
    /// Aborts the analysis if a value has a different width.
    #[must_use]
    pub fn from_values<I>(width: u32, values: I) -> Self
    where
        I: IntoIterator<Item = ApInt>,
    {
        let mut result = Self::bottom(width);
        for value in values {
            result.insert(value);
            if result.top {
                break;
            }
        }
        result
    }

    fn insert(&mut self, value: ApInt) {
        invariant!(
            value.width() == self.width,
            "enumeration width mismatch: {} vs {}",
            self.width,
            value.width()
        );
        if self.top {
            return;
        }
        self.values.insert(value);
        if self.values.len() > ENUMERATION_LIMIT {
            self.set_top();
        }
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The members, empty when top.
    pub fn values(&self) -> impl Iterator<Item = &ApInt> {
        self.values.iter()
    }

    /// Number of members, `None` when top.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        (!self.top).then_some(self.values.len())
    }

    /// The only member, if there is exactly one.
    #[must_use]
    pub fn single_value(&self) -> Option<ApInt> {
        if !self.top && self.values.len() == 1 {
            self.values.first().copied()
        } else {
            None
        }
    }

    /// Returns `true` if `value` is a member (always when top).
    #[must_use]
    pub fn may_contain(&self, value: &ApInt) -> bool {
        self.top || self.values.contains(value)
    }

    /// Smallest member under the unsigned ordering.
    #[must_use]
    pub fn unsigned_min(&self) -> Option<ApInt> {
        if self.top {
            None
        } else {
            self.values.first().copied()
        }
    }

    /// Largest member under the unsigned ordering.
    #[must_use]
    pub fn unsigned_max(&self) -> Option<ApInt> {
        if self.top {
            None
        } else {
            self.values.last().copied()
        }
    }

    /// Smallest member under the signed ordering.
    #[must_use]
    pub fn signed_min(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.values.iter().copied().reduce(ApInt::smin_of)
    }

    /// Largest member under the signed ordering.
    #[must_use]
    pub fn signed_max(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.values.iter().copied().reduce(ApInt::smax_of)
    }

    fn check_width(&self, other: &Self) {
        invariant!(
            self.width == other.width,
            "enumeration width mismatch: {} vs {}",
            self.width,
            other.width
        );
    }

    /// Applies a concrete operation to every pair of members.
    ///
    /// `result_width` is the width of the produced values. Any undefined pair makes the
    /// whole result top.
    fn cross<F>(&self, other: &Self, result_width: u32, f: F) -> Self
    where
        F: Fn(&ApInt, &ApInt) -> Option<ApInt>,
    {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(result_width);
        }
        if self.top || other.top {
            return Self::top(result_width);
        }
        let mut result = Self::bottom(result_width);
        for a in &self.values {
            for b in &other.values {
                match f(a, b) {
                    Some(value) => result.insert(value),
                    None => return Self::top(result_width),
                }
                if result.top {
                    return result;
                }
            }
        }
        result
    }

    fn map<F>(&self, result_width: u32, f: F) -> Self
    where
        F: Fn(&ApInt) -> ApInt,
    {
        if self.top {
            return Self::top(result_width);
        }
        Self::from_values(result_width, self.values.iter().map(f))
    }

    /// Modular addition.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.wrapping_add(b)))
    }

    /// Modular subtraction.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.wrapping_sub(b)))
    }

    /// Modular multiplication.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.wrapping_mul(b)))
    }

    /// Unsigned division; a zero divisor makes the result top.
    #[must_use]
    pub fn udiv(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::udiv)
    }

    /// Signed division; a zero divisor or `MIN / -1` makes the result top.
    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| match a.sdiv_ov(b) {
            Some((value, false)) => Some(value),
            _ => None,
        })
    }

    /// Unsigned remainder; a zero divisor makes the result top.
    #[must_use]
    pub fn urem(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::urem)
    }

    /// Signed remainder; a zero divisor makes the result top.
    #[must_use]
    pub fn srem(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::srem)
    }

    /// Left shift; an amount not smaller than the width makes the result top.
    #[must_use]
    pub fn shl(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::shl)
    }

    /// Logical right shift.
    #[must_use]
    pub fn lshr(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::lshr)
    }

    /// Arithmetic right shift.
    #[must_use]
    pub fn ashr(&self, other: &Self) -> Self {
        self.cross(other, self.width, ApInt::ashr)
    }

    /// Bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.and(b)))
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.or(b)))
    }

    /// Bitwise exclusive or.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.cross(other, self.width, |a, b| Some(a.xor(b)))
    }

    /// Integer comparison producing a 1-bit set.
    #[must_use]
    pub fn icmp(&self, predicate: IntPredicate, other: &Self) -> Self {
        self.cross(other, 1, |a, b| {
            Some(ApInt::from_bool(predicate.evaluate(a, b)))
        })
    }

    /// Keeps the low `width` bits of every member.
    #[must_use]
    pub fn trunc(&self, width: u32) -> Self {
        self.map(width, |v| v.trunc(width))
    }

    /// Zero-extends every member.
    #[must_use]
    pub fn zext(&self, width: u32) -> Self {
        self.map(width, |v| v.zext(width))
    }

    /// Sign-extends every member.
    #[must_use]
    pub fn sext(&self, width: u32) -> Self {
        self.map(width, |v| v.sext(width))
    }
}

impl Domain for Enumeration {
    fn merge(&mut self, other: &Self) {
        self.check_width(other);
        if self.top {
            return;
        }
        if other.top {
            self.set_top();
            return;
        }
        self.values.extend(other.values.iter().copied());
        if self.values.len() > ENUMERATION_LIMIT {
            self.set_top();
        }
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.values.len() * std::mem::size_of::<ApInt>()
    }
}

impl AccuracyValue for Enumeration {
    fn accuracy(&self) -> f32 {
        if self.top {
            0.0
        } else if self.values.is_empty() {
            1.0
        } else {
            1.0 - (self.values.len() - 1) as f32 / ENUMERATION_LIMIT as f32
        }
    }

    fn is_bottom(&self) -> bool {
        !self.top && self.values.is_empty()
    }

    fn set_bottom(&mut self) {
        self.values.clear();
        self.top = false;
    }

    fn is_top(&self) -> bool {
        self.top
    }

    fn set_top(&mut self) {
        self.values.clear();
        self.top = true;
    }
}

impl fmt::Display for Enumeration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.top {
            return write!(f, "enum top");
        }
        if self.values.is_empty() {
            return write!(f, "enum bottom");
        }
        write!(f, "enum {{")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::domain::lattice::laws;

    fn set8(values: &[u64]) -> Enumeration {
        Enumeration::from_values(8, values.iter().map(|v| ApInt::new(8, *v)))
    }

    #[test]
    fn test_cross_product() {
        let sum = set8(&[1, 2]).add(&set8(&[10, 20]));
        assert_eq!(sum, set8(&[11, 12, 21, 22]));
        assert_eq!(set8(&[255]).add(&set8(&[1])), set8(&[0]));
    }

    #[test]
    fn test_collapse_on_merge() {
        let mut a = set8(&(0..30).collect::<Vec<_>>());
        a.merge(&set8(&(20..50).collect::<Vec<_>>()));
        assert!(a.is_top());
        assert_eq!(a.accuracy(), 0.0);

        let mut b = set8(&(0..20).collect::<Vec<_>>());
        b.merge(&set8(&(20..40).collect::<Vec<_>>()));
        assert_eq!(b.len(), Some(ENUMERATION_LIMIT));
    }

    #[test]
    fn test_collapse_on_large_product() {
        let a = set8(&(0..10).collect::<Vec<_>>());
        let b = set8(&(0..10).map(|v| v * 16).collect::<Vec<_>>());
        assert!(a.or(&b).is_top());
    }

    #[test]
    fn test_undefined_operations_go_top() {
        assert!(set8(&[10]).udiv(&set8(&[0, 2])).is_top());
        assert!(set8(&[10]).srem(&set8(&[0])).is_top());
        assert!(set8(&[0x80]).sdiv(&set8(&[0xff])).is_top());
        assert!(set8(&[1]).shl(&set8(&[8])).is_top());
        assert_eq!(set8(&[10, 20]).udiv(&set8(&[5])), set8(&[2, 4]));
    }

    #[test]
    fn test_icmp_and_casts() {
        let cmp = set8(&[1, 2]).icmp(IntPredicate::Ult, &set8(&[2]));
        assert_eq!(cmp.len(), Some(2));
        let sure = set8(&[1, 2]).icmp(IntPredicate::Ult, &set8(&[3]));
        assert_eq!(sure.single_value(), Some(ApInt::from_bool(true)));

        let wide = set8(&[0xff]).sext(16);
        assert_eq!(wide.single_value(), Some(ApInt::new(16, 0xffff)));
        let narrow = Enumeration::from_values(16, [ApInt::new(16, 0x100), ApInt::new(16, 0x200)])
            .trunc(8);
        assert_eq!(narrow, set8(&[0]));
    }

    #[test]
    fn test_bounds() {
        let set = set8(&[0x7f, 0x80, 3]);
        assert_eq!(set.unsigned_min().map(|v| v.zext_value()), Some(3));
        assert_eq!(set.unsigned_max().map(|v| v.zext_value()), Some(0x80));
        assert_eq!(set.signed_min().map(|v| v.sext_value()), Some(-128));
        assert_eq!(set.signed_max().map(|v| v.sext_value()), Some(127));
    }

    #[test]
    fn test_display() {
        assert_eq!(set8(&[1, 2]).to_string(), "enum {0x1 (1), 0x2 (2)}");
        assert_eq!(Enumeration::top(8).to_string(), "enum top");
    }

    fn arb_enum() -> impl Strategy<Value = Enumeration> {
        prop_oneof![
            Just(Enumeration::top(8)),
            prop::collection::vec(any::<u8>(), 0..45)
                .prop_map(|values| Enumeration::from_values(
                    8,
                    values.into_iter().map(|v| ApInt::new(8, u64::from(v)))
                )),
        ]
    }

    proptest! {
        #[test]
        fn prop_lattice_laws(a in arb_enum(), b in arb_enum(), c in arb_enum()) {
            laws::check_idempotent(&a);
            laws::check_commutative(&a, &b);
            laws::check_associative(&a, &b, &c);
            laws::check_monotone(&a, &b);
        }
    }
}
