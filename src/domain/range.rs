//! Interval abstraction with a signed and an unsigned reading.
//!
//! The same bit pattern means different numbers to signed and unsigned instructions, so a
//! [`Range`] keeps one inclusive interval per interpretation. Each interval is either known
//! or top on its own. Arithmetic computes every known interpretation with overflow checks
//! and drops the interpretation to top on a possible overflow instead of wrapping.
//!
//! Operations that only make sense for one interpretation (`udiv`, `lshr`, `and`, ... are
//! unsigned; `sdiv`, `srem`, `ashr` are signed) compute that interpretation and derive the
//! other one when the result does not straddle the sign boundary.
//!
//! # Widening
//!
//! Ranges have a height proportional to `2^width`. [`Domain::widen`] pushes every bound that
//! moved since the previous iteration to the type extreme, so loops converge in a few passes.

use std::fmt;

use crate::{
    domain::{apint::check_supported_width, compare_bounds, AccuracyValue, ApInt, Domain},
    ir::IntPredicate,
};

/// Inclusive interval, bounds stored as the reading of the interpretation it belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct Interval {
    from: i128,
    to: i128,
}

/// Smallest and largest reading of `width` bits.
fn limits(width: u32, signed: bool) -> (i128, i128) {
    if signed {
        let half = 1i128 << (width - 1);
        (-half, half - 1)
    } else {
        (0, (1i128 << width) - 1)
    }
}

fn read(value: &ApInt, signed: bool) -> i128 {
    if signed {
        i128::from(value.sext_value())
    } else {
        i128::from(value.zext_value())
    }
}

/// Builds an interval, `None` (top) on overflow, wrap-around or the full range.
fn interval(width: u32, signed: bool, from: i128, to: i128) -> Option<Interval> {
    let (min, max) = limits(width, signed);
    if from < min || to > max || from > to || (from == min && to == max) {
        None
    } else {
        Some(Interval { from, to })
    }
}

/// Smallest `2^n - 1` not below `value`.
fn fill_ones(value: i128) -> i128 {
    let mut result = 0i128;
    while result < value {
        result = (result << 1) | 1;
    }
    result
}

fn corners<F>(a: Interval, b: Interval, f: F) -> Option<(i128, i128)>
where
    F: Fn(i128, i128) -> Option<i128>,
{
    let values = [
        f(a.from, b.from)?,
        f(a.from, b.to)?,
        f(a.to, b.from)?,
        f(a.to, b.to)?,
    ];
    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;
    Some((min, max))
}

/// Interval value over a fixed width.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Range {
    width: u32,
    empty: bool,
    signed: Option<Interval>,
    unsigned: Option<Interval>,
}

impl Range {
    /// No value.
    #[must_use]
    pub fn bottom(width: u32) -> Self {
        check_supported_width(width);
        Self {
            width,
            empty: true,
            signed: None,
            unsigned: None,
        }
    }

    /// Every value of the width.
    #[must_use]
    pub fn top(width: u32) -> Self {
        check_supported_width(width);
        Self {
            width,
            empty: false,
            signed: None,
            unsigned: None,
        }
    }

    /// A single value, known in both interpretations.
    #[must_use]
    pub fn from_constant(value: &ApInt) -> Self {
        let width = value.width();
        Self {
            width,
            empty: false,
            signed: interval(width, true, read(value, true), read(value, true)),
            unsigned: interval(width, false, read(value, false), read(value, false)),
        }
    }

    /// `[from, to]` under the signed ordering; the unsigned reading stays top.
    ///
    /// A wrap-around pair (`from > to`) gives top.
    #[must_use]
    pub fn signed(from: &ApInt, to: &ApInt) -> Self {
        let mut result = Self::top(from.width());
        result.signed = interval(from.width(), true, read(from, true), read(to, true));
        result
    }

    /// `[from, to]` under the unsigned ordering; the signed reading stays top.
    ///
    /// A wrap-around pair (`from > to`) gives top.
    #[must_use]
    pub fn unsigned(from: &ApInt, to: &ApInt) -> Self {
        let mut result = Self::top(from.width());
        result.unsigned = interval(from.width(), false, read(from, false), read(to, false));
        result
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    fn stored(&self, signed: bool) -> Option<Interval> {
        if signed {
            self.signed
        } else {
            self.unsigned
        }
    }

    /// The interval of an interpretation, derived from the other one when it is unknown
    /// and the other does not straddle the sign boundary.
    fn view(&self, signed: bool) -> Option<Interval> {
        if self.empty {
            return None;
        }
        self.stored(signed).or_else(|| {
            let other = self.stored(!signed)?;
            let modulus = 1i128 << self.width;
            let (from, to) = if signed {
                let (_, smax) = limits(self.width, true);
                match (other.from > smax, other.to > smax) {
                    (false, false) => (other.from, other.to),
                    (true, true) => (other.from - modulus, other.to - modulus),
                    _ => return None,
                }
            } else {
                match (other.from < 0, other.to < 0) {
                    (false, false) => (other.from, other.to),
                    (true, true) => (other.from + modulus, other.to + modulus),
                    _ => return None,
                }
            };
            interval(self.width, signed, from, to)
        })
    }

    fn bound(&self, signed: bool, upper: bool) -> Option<ApInt> {
        let view = self.view(signed)?;
        let value = if upper { view.to } else { view.from };
        Some(ApInt::new(self.width, value as u64))
    }

    /// Smallest signed value.
    #[must_use]
    pub fn signed_min(&self) -> Option<ApInt> {
        self.bound(true, false)
    }

    /// Largest signed value.
    #[must_use]
    pub fn signed_max(&self) -> Option<ApInt> {
        self.bound(true, true)
    }

    /// Smallest unsigned value.
    #[must_use]
    pub fn unsigned_min(&self) -> Option<ApInt> {
        self.bound(false, false)
    }

    /// Largest unsigned value.
    #[must_use]
    pub fn unsigned_max(&self) -> Option<ApInt> {
        self.bound(false, true)
    }

    /// The only value, if either interpretation is a singleton.
    #[must_use]
    pub fn single_value(&self) -> Option<ApInt> {
        [true, false].into_iter().find_map(|signed| {
            self.stored(signed)
                .filter(|i| i.from == i.to)
                .map(|i| ApInt::new(self.width, i.from as u64))
        })
    }

    /// Returns `true` if `value` lies within every known interval.
    #[must_use]
    pub fn may_contain(&self, value: &ApInt) -> bool {
        !self.empty
            && [true, false].into_iter().all(|signed| {
                self.stored(signed).map_or(true, |i| {
                    let v = read(value, signed);
                    i.from <= v && v <= i.to
                })
            })
    }

    fn check_width(&self, other: &Self) {
        invariant!(
            self.width == other.width,
            "range width mismatch: {} vs {}",
            self.width,
            other.width
        );
    }

    /// Fills an unknown interpretation from a known one.
    fn derived(mut self) -> Self {
        let signed = self.view(true);
        let unsigned = self.view(false);
        self.signed = signed;
        self.unsigned = unsigned;
        self
    }

    /// Exact result when both operands are single values.
    fn concrete<F>(&self, other: &Self, f: F) -> Option<Self>
    where
        F: Fn(&ApInt, &ApInt) -> Option<ApInt>,
    {
        let (a, b) = (self.single_value()?, other.single_value()?);
        Some(match f(&a, &b) {
            Some(value) => Self::from_constant(&value),
            None => Self::top(self.width),
        })
    }

    /// Computes both interpretations from the stored intervals.
    fn both<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(Interval, Interval, bool) -> Option<(i128, i128)>,
    {
        self.check_width(other);
        if self.empty || other.empty {
            return Self::bottom(self.width);
        }
        let compute = |signed: bool| {
            let (a, b) = (self.stored(signed)?, other.stored(signed)?);
            let (from, to) = f(a, b, signed)?;
            interval(self.width, signed, from, to)
        };
        Self {
            width: self.width,
            empty: false,
            signed: compute(true),
            unsigned: compute(false),
        }
    }

    /// Computes one interpretation and derives the other.
    fn one<F>(&self, other: &Self, signed: bool, f: F) -> Self
    where
        F: Fn(Interval, Interval) -> Option<(i128, i128)>,
    {
        self.check_width(other);
        if self.empty || other.empty {
            return Self::bottom(self.width);
        }
        let mut result = Self::top(self.width);
        let computed = (|| {
            let (a, b) = (self.stored(signed)?, other.stored(signed)?);
            let (from, to) = f(a, b)?;
            interval(self.width, signed, from, to)
        })();
        if signed {
            result.signed = computed;
        } else {
            result.unsigned = computed;
        }
        result.derived()
    }

    /// Shift amounts as an unsigned interval below the width.
    fn shift_amounts(&self, amount: &Self) -> Option<Interval> {
        amount
            .view(false)
            .filter(|k| k.to < i128::from(self.width))
    }

    /// Addition; an overflowing interpretation becomes top.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.both(other, |a, b, _| Some((a.from + b.from, a.to + b.to)))
    }

    /// Subtraction; an overflowing interpretation becomes top.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.both(other, |a, b, _| Some((a.from - b.to, a.to - b.from)))
    }

    /// Multiplication; an overflowing interpretation becomes top.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        self.both(other, |a, b, _| corners(a, b, i128::checked_mul))
    }

    /// Unsigned division; a divisor range containing zero gives top.
    #[must_use]
    pub fn udiv(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, ApInt::udiv) {
            return exact;
        }
        self.one(other, false, |a, b| {
            (b.from > 0).then(|| (a.from / b.to, a.to / b.from))
        })
    }

    /// Signed division; a divisor range containing zero or `MIN / -1` gives top.
    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Self {
        self.one(other, true, |a, b| {
            if b.from <= 0 && b.to >= 0 {
                None
            } else {
                corners(a, b, i128::checked_div)
            }
        })
    }

    /// Unsigned remainder.
    #[must_use]
    pub fn urem(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, ApInt::urem) {
            return exact;
        }
        self.one(other, false, |a, b| {
            if b.from == 0 {
                None
            } else if a.to < b.from {
                Some((a.from, a.to))
            } else {
                Some((0, a.to.min(b.to - 1)))
            }
        })
    }

    /// Signed remainder, carrying the sign of the dividend.
    #[must_use]
    pub fn srem(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, ApInt::srem) {
            return exact;
        }
        self.one(other, true, |a, b| {
            if b.from <= 0 && b.to >= 0 {
                return None;
            }
            let bound = b.from.abs().max(b.to.abs()) - 1;
            Some((a.from.max(-bound).min(0), a.to.min(bound).max(0)))
        })
    }

    /// Left shift; a shifted-out significant bit makes the interpretation top.
    #[must_use]
    pub fn shl(&self, other: &Self) -> Self {
        self.check_width(other);
        if let Some(exact) = self.concrete(other, ApInt::shl) {
            return exact;
        }
        if self.empty || other.empty {
            return Self::bottom(self.width);
        }
        let Some(amounts) = self.shift_amounts(other) else {
            return Self::top(self.width);
        };
        let compute = |signed: bool| {
            let a = self.stored(signed)?;
            let (from, to) = corners(a, amounts, |v, k| {
                u32::try_from(k)
                    .ok()
                    .and_then(|k| 1i128.checked_shl(k))
                    .and_then(|factor| v.checked_mul(factor))
            })?;
            interval(self.width, signed, from, to)
        };
        Self {
            width: self.width,
            empty: false,
            signed: compute(true),
            unsigned: compute(false),
        }
        .derived()
    }

    /// Logical right shift.
    #[must_use]
    pub fn lshr(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, ApInt::lshr) {
            return exact;
        }
        let Some(amounts) = self.shift_amounts(other) else {
            return self.shift_fallback(other);
        };
        self.one(&Self::unsigned_of(self.width, amounts), false, |a, k| {
            Some((a.from >> k.to, a.to >> k.from))
        })
    }

    /// Arithmetic right shift.
    #[must_use]
    pub fn ashr(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, ApInt::ashr) {
            return exact;
        }
        let Some(amounts) = self.shift_amounts(other) else {
            return self.shift_fallback(other);
        };
        let Some(a) = self.view(true) else {
            return self.shift_fallback(other);
        };
        let value = Self {
            width: self.width,
            empty: false,
            signed: Some(a),
            unsigned: None,
        };
        value.one(&Self::unsigned_of(self.width, amounts), true, move |a, _| {
            corners(a, amounts, |v, k| u32::try_from(k).ok().map(|k| v >> k))
        })
    }

    fn shift_fallback(&self, other: &Self) -> Self {
        self.check_width(other);
        if self.empty || other.empty {
            Self::bottom(self.width)
        } else {
            Self::top(self.width)
        }
    }

    /// A range whose stored intervals are `amounts` in both readings.
    ///
    /// Shift amounts are below the width, so both readings agree.
    fn unsigned_of(width: u32, amounts: Interval) -> Self {
        Self {
            width,
            empty: false,
            signed: interval(width, true, amounts.from, amounts.to),
            unsigned: Some(amounts),
        }
    }

    /// Bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, |a, b| Some(a.and(b))) {
            return exact;
        }
        self.one(other, false, |a, b| Some((0, a.to.min(b.to))))
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, |a, b| Some(a.or(b))) {
            return exact;
        }
        self.one(other, false, |a, b| {
            Some((a.from.max(b.from), fill_ones(a.to | b.to)))
        })
    }

    /// Bitwise exclusive or.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        if let Some(exact) = self.concrete(other, |a, b| Some(a.xor(b))) {
            return exact;
        }
        self.one(other, false, |a, b| Some((0, fill_ones(a.to | b.to))))
    }

    /// Integer comparison producing a 1-bit range.
    ///
    /// The result is definite only when the intervals are ordered for every element.
    #[must_use]
    pub fn icmp(&self, predicate: IntPredicate, other: &Self) -> Self {
        self.check_width(other);
        if self.empty || other.empty {
            return Self::bottom(1);
        }
        let decide = |signed: bool| {
            let bounds = |range: &Self| {
                range.bound(signed, false).zip(range.bound(signed, true))
            };
            compare_bounds(predicate, signed, bounds(self)?, bounds(other)?)
        };
        let result = match predicate {
            IntPredicate::Eq | IntPredicate::Ne => decide(true).or_else(|| decide(false)),
            _ => decide(predicate.is_signed()),
        };
        match result {
            Some(value) => Self::from_constant(&ApInt::from_bool(value)),
            None => Self::top(1),
        }
    }

    /// Keeps the low `width` bits.
    #[must_use]
    pub fn trunc(&self, width: u32) -> Self {
        if self.empty {
            return Self::bottom(width);
        }
        let fit = |signed: bool| {
            let view = self.view(signed)?;
            interval(width, signed, view.from, view.to)
        };
        Self {
            width,
            empty: false,
            signed: fit(true),
            unsigned: fit(false),
        }
        .derived()
    }

    /// Zero-extends to a larger width.
    #[must_use]
    pub fn zext(&self, width: u32) -> Self {
        if self.empty {
            return Self::bottom(width);
        }
        let unsigned = self
            .view(false)
            .unwrap_or(Interval {
                from: 0,
                to: limits(self.width, false).1,
            });
        Self {
            width,
            empty: false,
            signed: interval(width, true, unsigned.from, unsigned.to),
            unsigned: interval(width, false, unsigned.from, unsigned.to),
        }
    }

    /// Sign-extends to a larger width.
    #[must_use]
    pub fn sext(&self, width: u32) -> Self {
        if self.empty {
            return Self::bottom(width);
        }
        let (min, max) = limits(self.width, true);
        let signed = self.view(true).unwrap_or(Interval { from: min, to: max });
        Self {
            width,
            empty: false,
            signed: interval(width, true, signed.from, signed.to),
            unsigned: None,
        }
        .derived()
    }
}

impl Domain for Range {
    fn merge(&mut self, other: &Self) {
        self.check_width(other);
        if other.empty {
            return;
        }
        if self.empty {
            *self = other.clone();
            return;
        }
        let width = self.width;
        let hull = |signed: bool, a: Option<Interval>, b: Option<Interval>| {
            let (a, b) = (a?, b?);
            interval(width, signed, a.from.min(b.from), a.to.max(b.to))
        };
        self.signed = hull(true, self.signed, other.signed);
        self.unsigned = hull(false, self.unsigned, other.unsigned);
    }

    fn widen(&mut self, other: &Self) {
        self.check_width(other);
        if other.empty {
            return;
        }
        if self.empty {
            *self = other.clone();
            return;
        }
        let width = self.width;
        let jump = |signed: bool, old: Option<Interval>, new: Option<Interval>| {
            let (old, new) = (old?, new?);
            let (min, max) = limits(width, signed);
            let from = if new.from < old.from { min } else { old.from };
            let to = if new.to > old.to { max } else { old.to };
            interval(width, signed, from, to)
        };
        self.signed = jump(true, self.signed, other.signed);
        self.unsigned = jump(false, self.unsigned, other.unsigned);
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl AccuracyValue for Range {
    fn accuracy(&self) -> f32 {
        if self.empty {
            return 1.0;
        }
        let span = ((1u128 << self.width) - 1) as f64;
        [self.signed, self.unsigned]
            .into_iter()
            .flatten()
            .map(|i| (1.0 - (i.to - i.from) as f64 / span) as f32)
            .fold(0.0, f32::max)
    }

    fn is_bottom(&self) -> bool {
        self.empty
    }

    fn set_bottom(&mut self) {
        *self = Self::bottom(self.width);
    }

    fn is_top(&self) -> bool {
        !self.empty && self.signed.is_none() && self.unsigned.is_none()
    }

    fn set_top(&mut self) {
        *self = Self::top(self.width);
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            return write!(f, "range bottom");
        }
        if self.is_top() {
            return write!(f, "range top");
        }
        let part = |i: Option<Interval>| match i {
            Some(i) => format!("[{}, {}]", i.from, i.to),
            None => "top".to_string(),
        };
        write!(
            f,
            "range signed {}, unsigned {}",
            part(self.signed),
            part(self.unsigned)
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::domain::lattice::laws;

    fn c8(value: u64) -> Range {
        Range::from_constant(&ApInt::new(8, value))
    }

    fn u8r(from: u64, to: u64) -> Range {
        Range::unsigned(&ApInt::new(8, from), &ApInt::new(8, to))
    }

    fn s8r(from: i64, to: i64) -> Range {
        Range::signed(&ApInt::from_signed(8, from), &ApInt::from_signed(8, to))
    }

    #[test]
    fn test_unsigned_overflow_is_top() {
        let sum = u8r(250, 255).add(&c8(10));
        assert!(sum.is_top());
        assert_eq!(sum.accuracy(), 0.0);
    }

    #[test]
    fn test_add_sub_within_bounds() {
        let sum = s8r(-10, 10).add(&s8r(1, 2));
        assert_eq!(sum.signed_min().map(|v| v.sext_value()), Some(-9));
        assert_eq!(sum.signed_max().map(|v| v.sext_value()), Some(12));

        let diff = u8r(10, 20).sub(&c8(5));
        assert_eq!(diff.unsigned_min().map(|v| v.zext_value()), Some(5));
        assert_eq!(diff.unsigned_max().map(|v| v.zext_value()), Some(15));
        assert!(u8r(0, 20).sub(&c8(5)).is_top());
    }

    #[test]
    fn test_mul_corners() {
        let product = s8r(-3, 2).mul(&s8r(4, 5));
        assert_eq!(product.signed_min().map(|v| v.sext_value()), Some(-15));
        assert_eq!(product.signed_max().map(|v| v.sext_value()), Some(10));
        assert!(s8r(-100, 100).mul(&s8r(2, 2)).is_top());
    }

    #[test]
    fn test_udiv_derives_signed() {
        let quotient = u8r(10, 20).udiv(&u8r(2, 5));
        assert_eq!(quotient.to_string(), "range signed [2, 10], unsigned [2, 10]");
        assert!(u8r(10, 20).udiv(&u8r(0, 5)).is_top());
        assert!(s8r(-128, -100).sdiv(&c8(0xff)).is_top());
    }

    #[test]
    fn test_rem_and_bitwise() {
        let rem = u8r(0, 200).urem(&c8(10));
        assert_eq!(rem.unsigned_max().map(|v| v.zext_value()), Some(9));
        let srem = s8r(-50, -1).srem(&c8(8));
        assert_eq!(srem.signed_min().map(|v| v.sext_value()), Some(-7));
        assert_eq!(srem.signed_max().map(|v| v.sext_value()), Some(0));
        let or = u8r(1, 5).or(&u8r(8, 9));
        assert_eq!(or.unsigned_min().map(|v| v.zext_value()), Some(8));
        assert_eq!(or.unsigned_max().map(|v| v.zext_value()), Some(15));
        assert_eq!(c8(5).and(&c8(3)), c8(1));
    }

    #[test]
    fn test_shifts() {
        let shifted = u8r(1, 3).shl(&u8r(1, 2));
        assert_eq!(shifted.unsigned_min().map(|v| v.zext_value()), Some(2));
        assert_eq!(shifted.unsigned_max().map(|v| v.zext_value()), Some(12));
        assert!(u8r(1, 200).shl(&c8(1)).unsigned_max().is_none());
        let logical = u8r(16, 64).lshr(&u8r(1, 2));
        assert_eq!(logical.unsigned_min().map(|v| v.zext_value()), Some(4));
        assert_eq!(logical.unsigned_max().map(|v| v.zext_value()), Some(32));
        let arithmetic = s8r(-64, -16).ashr(&c8(2));
        assert_eq!(arithmetic.signed_min().map(|v| v.sext_value()), Some(-16));
        assert_eq!(arithmetic.signed_max().map(|v| v.sext_value()), Some(-4));
        assert!(c8(1).shl(&u8r(0, 8)).is_top());
    }

    #[test]
    fn test_icmp_requires_strict_order() {
        let yes = u8r(1, 5).icmp(IntPredicate::Ult, &u8r(6, 9));
        assert_eq!(yes.single_value(), Some(ApInt::from_bool(true)));
        let maybe = u8r(1, 5).icmp(IntPredicate::Ult, &u8r(5, 9));
        assert!(maybe.is_top());
        let no = s8r(-5, -1).icmp(IntPredicate::Sgt, &s8r(0, 3));
        assert_eq!(no.single_value(), Some(ApInt::from_bool(false)));
        let ne = c8(3).icmp(IntPredicate::Ne, &u8r(4, 9));
        assert_eq!(ne.single_value(), Some(ApInt::from_bool(true)));
    }

    #[test]
    fn test_casts() {
        let wide = s8r(-3, -1).sext(16);
        assert_eq!(wide.unsigned_min().map(|v| v.zext_value()), Some(0xfffd));
        let zero = s8r(-3, -1).zext(16);
        assert_eq!(zero.signed_min().map(|v| v.sext_value()), Some(0xfd));
        let narrow = Range::from_constant(&ApInt::new(16, 300)).trunc(8);
        assert!(narrow.is_top());
        let fits = Range::unsigned(&ApInt::new(16, 3), &ApInt::new(16, 9)).trunc(8);
        assert_eq!(fits.unsigned_max().map(|v| v.zext_value()), Some(9));
    }

    #[test]
    fn test_widen_jumps_moving_bounds() {
        let mut old = s8r(0, 1);
        old.widen(&s8r(0, 2));
        assert_eq!(old.signed_max().map(|v| v.sext_value()), Some(127));
        assert_eq!(old.signed_min().map(|v| v.sext_value()), Some(0));

        let mut stable = s8r(0, 5);
        stable.widen(&s8r(1, 4));
        assert_eq!(stable, s8r(0, 5));
    }

    #[test]
    fn test_full_interval_is_top() {
        assert!(u8r(0, 255).is_top());
        assert!(u8r(200, 100).is_top());
        let mut low = u8r(0, 100);
        low.merge(&u8r(101, 255));
        assert!(low.is_top());
    }

    fn arb_range() -> impl Strategy<Value = Range> {
        prop_oneof![
            Just(Range::bottom(8)),
            (any::<i8>(), any::<i8>()).prop_map(|(a, b)| s8r(
                i64::from(a.min(b)),
                i64::from(a.max(b))
            )),
            (any::<u8>(), any::<u8>()).prop_map(|(a, b)| u8r(
                u64::from(a.min(b)),
                u64::from(a.max(b))
            )),
            any::<u8>().prop_map(|v| c8(u64::from(v))),
        ]
    }

    proptest! {
        #[test]
        fn prop_lattice_laws(a in arb_range(), b in arb_range(), c in arb_range()) {
            laws::check_idempotent(&a);
            laws::check_commutative(&a, &b);
            laws::check_associative(&a, &b, &c);
            laws::check_monotone(&a, &b);
        }

        #[test]
        fn prop_arithmetic_is_sound(
            x in any::<u8>(), dx in 0u8..16, y in any::<u8>(), dy in 0u8..16
        ) {
            let a = u8r(u64::from(x), u64::from(x.saturating_add(dx)));
            let b = u8r(u64::from(y), u64::from(y.saturating_add(dy)));
            let (x, y) = (ApInt::new(8, u64::from(x)), ApInt::new(8, u64::from(y)));
            prop_assert!(a.add(&b).may_contain(&x.wrapping_add(&y)));
            prop_assert!(a.sub(&b).may_contain(&x.wrapping_sub(&y)));
            prop_assert!(a.mul(&b).may_contain(&x.wrapping_mul(&y)));
            if let Some(q) = x.udiv(&y) {
                prop_assert!(a.udiv(&b).may_contain(&q));
            }
            prop_assert!(a.or(&b).may_contain(&x.or(&y)));
        }
    }
}
