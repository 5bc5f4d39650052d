//! Known-bits abstraction.
//!
//! Every bit position of a [`Bits`] value is known-0, known-1 or unknown. The state is kept
//! in two masks: `ones` holds the positions known to be 1, `zeros` the positions known to
//! be 0. A position present in neither mask is unknown. A position present in both masks
//! is a contradiction; such values are canonicalised to bottom (both masks full) so that
//! structural equality coincides with lattice equality.
//!
//! Bitwise operations are exact per bit. Addition, subtraction and multiplication ripple
//! three-valued carries and lose precision only where an unknown input bit or carry reaches.

use std::fmt;

use crate::{
    domain::{
        apint::{check_supported_width, width_mask},
        compare_bounds, AccuracyValue, ApInt, Domain,
    },
    ir::IntPredicate,
};

/// Three-valued bit.
type Trit = Option<bool>;

/// Known-bits value of a fixed width.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Bits {
    width: u32,
    ones: u64,
    zeros: u64,
}

impl Bits {
    /// Creates a value with every bit unknown.
    #[must_use]
    pub fn top(width: u32) -> Self {
        check_supported_width(width);
        Self {
            width,
            ones: 0,
            zeros: 0,
        }
    }

    /// Creates the contradictory value.
    #[must_use]
    pub fn bottom(width: u32) -> Self {
        check_supported_width(width);
        let mask = width_mask(width);
        Self {
            width,
            ones: mask,
            zeros: mask,
        }
    }

    /// Creates a fully known value.
    #[must_use]
    pub fn from_constant(value: &ApInt) -> Self {
        Self {
            width: value.width(),
            ones: value.zext_value(),
            zeros: !value.zext_value() & value.mask(),
        }
    }

    /// Creates a value from raw masks, canonicalising contradictions to bottom.
    #[must_use]
    pub fn from_masks(width: u32, ones: u64, zeros: u64) -> Self {
        let mask = width_mask(width);
        let (ones, zeros) = (ones & mask, zeros & mask);
        if ones & zeros != 0 {
            Self::bottom(width)
        } else {
            Self { width, ones, zeros }
        }
    }

    fn from_option(width: u32, value: Option<ApInt>) -> Self {
        match value {
            Some(value) => Self::from_constant(&value),
            None => Self::top(width),
        }
    }

    fn from_bool(value: Option<bool>) -> Self {
        Self::from_option(1, value.map(ApInt::from_bool))
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask of positions known to be 1.
    #[must_use]
    pub const fn ones(&self) -> u64 {
        self.ones
    }

    /// Mask of positions known to be 0.
    #[must_use]
    pub const fn zeros(&self) -> u64 {
        self.zeros
    }

    fn mask(&self) -> u64 {
        width_mask(self.width)
    }

    fn known(&self) -> u64 {
        self.ones | self.zeros
    }

    fn sign_mask(&self) -> u64 {
        1u64 << (self.width - 1)
    }

    fn trit(&self, index: u32) -> Trit {
        if self.ones >> index & 1 == 1 {
            Some(true)
        } else if self.zeros >> index & 1 == 1 {
            Some(false)
        } else {
            None
        }
    }

    fn check_width(&self, other: &Self) {
        invariant!(
            self.width == other.width,
            "bits width mismatch: {} vs {}",
            self.width,
            other.width
        );
    }

    /// The concrete value, if every bit is known.
    #[must_use]
    pub fn single_value(&self) -> Option<ApInt> {
        if !self.is_bottom() && self.known() == self.mask() {
            Some(ApInt::new(self.width, self.ones))
        } else {
            None
        }
    }

    /// Returns `true` if `value` agrees with every known bit.
    #[must_use]
    pub fn may_contain(&self, value: &ApInt) -> bool {
        let v = value.zext_value();
        !self.is_bottom() && v & self.zeros == 0 && !v & self.ones & self.mask() == 0
    }

    /// Smallest unsigned value compatible with the known bits.
    #[must_use]
    pub fn unsigned_min(&self) -> Option<ApInt> {
        (!self.is_bottom()).then(|| ApInt::new(self.width, self.ones))
    }

    /// Largest unsigned value compatible with the known bits.
    #[must_use]
    pub fn unsigned_max(&self) -> Option<ApInt> {
        (!self.is_bottom()).then(|| ApInt::new(self.width, !self.zeros))
    }

    /// Smallest signed value compatible with the known bits.
    #[must_use]
    pub fn signed_min(&self) -> Option<ApInt> {
        if self.is_bottom() {
            return None;
        }
        let sign = if self.zeros & self.sign_mask() == 0 {
            self.sign_mask()
        } else {
            0
        };
        Some(ApInt::new(self.width, (self.ones & !self.sign_mask()) | sign))
    }

    /// Largest signed value compatible with the known bits.
    #[must_use]
    pub fn signed_max(&self) -> Option<ApInt> {
        if self.is_bottom() {
            return None;
        }
        let sign = self.ones & self.sign_mask();
        Some(ApInt::new(
            self.width,
            (!self.zeros & !self.sign_mask()) | sign,
        ))
    }

    /// Applies `f` to two fully known operands, top otherwise.
    fn exact<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&ApInt, &ApInt) -> Option<ApInt>,
    {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(self.width);
        }
        match (self.single_value(), other.single_value()) {
            (Some(a), Some(b)) => Self::from_option(self.width, f(&a, &b)),
            _ => Self::top(self.width),
        }
    }

    /// Ripple-carry addition of three-valued bits.
    fn ripple_add(&self, other: &Self, carry_in: bool) -> Self {
        let mut ones = 0u64;
        let mut zeros = 0u64;
        let mut carry: Trit = Some(carry_in);
        for index in 0..self.width {
            let inputs = [self.trit(index), other.trit(index), carry];
            if let [Some(a), Some(b), Some(c)] = inputs {
                if a ^ b ^ c {
                    ones |= 1 << index;
                } else {
                    zeros |= 1 << index;
                }
            }
            let known_ones = inputs.iter().filter(|t| **t == Some(true)).count();
            let known_zeros = inputs.iter().filter(|t| **t == Some(false)).count();
            carry = if known_ones >= 2 {
                Some(true)
            } else if known_zeros >= 2 {
                Some(false)
            } else {
                None
            };
        }
        Self::from_masks(self.width, ones, zeros)
    }

    fn complement(&self) -> Self {
        Self {
            width: self.width,
            ones: self.zeros,
            zeros: self.ones,
        }
    }

    /// Modular addition.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(self.width);
        }
        self.ripple_add(other, false)
    }

    /// Modular subtraction, computed as `a + !b + 1`.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(self.width);
        }
        self.ripple_add(&other.complement(), true)
    }

    /// Modular multiplication by shift-and-add of partial products.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(self.width);
        }
        let mut result = Self::from_constant(&ApInt::zero(self.width));
        for index in 0..self.width {
            let low = (1u64 << index) - 1;
            let partial = match other.trit(index) {
                Some(false) => continue,
                Some(true) => {
                    Self::from_masks(self.width, self.ones << index, (self.zeros << index) | low)
                }
                None => Self::from_masks(self.width, 0, (self.zeros << index) | low),
            };
            result = result.add(&partial);
            if result.is_top() {
                break;
            }
        }
        result
    }

    /// Unsigned division.
    #[must_use]
    pub fn udiv(&self, other: &Self) -> Self {
        self.exact(other, ApInt::udiv)
    }

    /// Signed division.
    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Self {
        self.exact(other, ApInt::sdiv)
    }

    /// Unsigned remainder.
    #[must_use]
    pub fn urem(&self, other: &Self) -> Self {
        self.exact(other, ApInt::urem)
    }

    /// Signed remainder.
    #[must_use]
    pub fn srem(&self, other: &Self) -> Self {
        self.exact(other, ApInt::srem)
    }

    fn known_shift(&self, amount: &Self) -> Option<u32> {
        amount
            .single_value()
            .filter(|a| a.zext_value() < u64::from(self.width))
            .and_then(|a| u32::try_from(a.zext_value()).ok())
    }

    fn shift_with<F>(&self, amount: &Self, f: F) -> Self
    where
        F: Fn(&Self, u32) -> Self,
    {
        self.check_width(amount);
        if self.is_bottom() || amount.is_bottom() {
            return Self::bottom(self.width);
        }
        match self.known_shift(amount) {
            Some(amount) => f(self, amount),
            None => Self::top(self.width),
        }
    }

    /// Left shift.
    #[must_use]
    pub fn shl(&self, amount: &Self) -> Self {
        self.shift_with(amount, |bits, k| {
            Self::from_masks(bits.width, bits.ones << k, (bits.zeros << k) | ((1u64 << k) - 1))
        })
    }

    /// Logical right shift.
    #[must_use]
    pub fn lshr(&self, amount: &Self) -> Self {
        self.shift_with(amount, |bits, k| {
            let high = bits.mask() & !(bits.mask() >> k);
            Self::from_masks(bits.width, bits.ones >> k, (bits.zeros >> k) | high)
        })
    }

    /// Arithmetic right shift.
    #[must_use]
    pub fn ashr(&self, amount: &Self) -> Self {
        self.shift_with(amount, |bits, k| {
            let shift = |mask: u64| ApInt::new(bits.width, mask).sext_value() >> k;
            Self::from_masks(bits.width, shift(bits.ones) as u64, shift(bits.zeros) as u64)
        })
    }

    fn bitwise(&self, other: &Self, ones: u64, zeros: u64) -> Self {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(self.width);
        }
        Self::from_masks(self.width, ones, zeros)
    }

    /// Bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.bitwise(other, self.ones & other.ones, self.zeros | other.zeros)
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.bitwise(other, self.ones | other.ones, self.zeros & other.zeros)
    }

    /// Bitwise exclusive or.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.bitwise(
            other,
            (self.ones & other.zeros) | (self.zeros & other.ones),
            (self.ones & other.ones) | (self.zeros & other.zeros),
        )
    }

    /// Integer comparison producing a 1-bit value.
    #[must_use]
    pub fn icmp(&self, predicate: IntPredicate, other: &Self) -> Self {
        self.check_width(other);
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom(1);
        }
        let conflict = (self.ones & other.zeros) | (self.zeros & other.ones) != 0;
        let equal = match (self.single_value(), other.single_value()) {
            _ if conflict => Some(false),
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        };
        let result = match predicate {
            IntPredicate::Eq => equal,
            IntPredicate::Ne => equal.map(|e| !e),
            _ => {
                let bounds = |bits: &Self| {
                    if predicate.is_signed() {
                        bits.signed_min().zip(bits.signed_max())
                    } else {
                        bits.unsigned_min().zip(bits.unsigned_max())
                    }
                };
                bounds(self)
                    .zip(bounds(other))
                    .and_then(|(a, b)| compare_bounds(predicate, predicate.is_signed(), a, b))
            }
        };
        Self::from_bool(result)
    }

    /// Keeps the low `width` bits.
    #[must_use]
    pub fn trunc(&self, width: u32) -> Self {
        if self.is_bottom() {
            return Self::bottom(width);
        }
        Self::from_masks(width, self.ones, self.zeros)
    }

    /// Zero-extends to `width` bits.
    #[must_use]
    pub fn zext(&self, width: u32) -> Self {
        if self.is_bottom() {
            return Self::bottom(width);
        }
        let high = width_mask(width) & !self.mask();
        Self::from_masks(width, self.ones, self.zeros | high)
    }

    /// Sign-extends to `width` bits.
    #[must_use]
    pub fn sext(&self, width: u32) -> Self {
        if self.is_bottom() {
            return Self::bottom(width);
        }
        let extend = |mask: u64| ApInt::new(self.width, mask).sext(width).zext_value();
        Self::from_masks(width, extend(self.ones), extend(self.zeros))
    }
}

impl Domain for Bits {
    fn merge(&mut self, other: &Self) {
        self.check_width(other);
        self.ones &= other.ones;
        self.zeros &= other.zeros;
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl AccuracyValue for Bits {
    fn accuracy(&self) -> f32 {
        if self.is_bottom() {
            return 1.0;
        }
        self.known().count_ones() as f32 / self.width as f32
    }

    fn is_bottom(&self) -> bool {
        self.ones & self.zeros != 0
    }

    fn set_bottom(&mut self) {
        *self = Self::bottom(self.width);
    }

    fn is_top(&self) -> bool {
        self.ones == 0 && self.zeros == 0
    }

    fn set_top(&mut self) {
        *self = Self::top(self.width);
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "bits bottom");
        }
        if self.is_top() {
            return write!(f, "bits top");
        }
        write!(f, "bits 0b")?;
        for index in (0..self.width).rev() {
            let c = match self.trit(index) {
                Some(true) => '1',
                Some(false) => '0',
                None => '?',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::domain::lattice::laws;

    fn c8(value: u64) -> Bits {
        Bits::from_constant(&ApInt::new(8, value))
    }

    #[test]
    fn test_and_of_constants() {
        assert_eq!(c8(5).and(&c8(3)), c8(1));
    }

    #[test]
    fn test_canonical_bottom() {
        let bits = Bits::from_masks(8, 0b1, 0b1);
        assert!(bits.is_bottom());
        assert_eq!(bits, Bits::bottom(8));
        assert_eq!(bits.accuracy(), 1.0);
    }

    #[test]
    fn test_merge_keeps_agreeing_bits() {
        let mut bits = c8(0b0101);
        bits.merge(&c8(0b0111));
        assert_eq!(bits.to_string(), "bits 0b00000?01");
        assert_eq!(bits.accuracy(), 7.0 / 8.0);

        let mut bottom = Bits::bottom(8);
        bottom.merge(&c8(9));
        assert_eq!(bottom, c8(9));
    }

    #[test]
    fn test_add_with_unknown_bit() {
        // {4, 5} + 1 = {5, 6}: bit 2 stays known, low bits do not
        let mut a = c8(4);
        a.merge(&c8(5));
        let sum = a.add(&c8(1));
        assert!(sum.may_contain(&ApInt::new(8, 5)));
        assert!(sum.may_contain(&ApInt::new(8, 6)));
        assert_eq!(sum.zeros() & 0xf8, 0xf8);
        assert_eq!(c8(250).add(&c8(10)), c8(4));
    }

    #[test]
    fn test_sub_and_mul_constants() {
        assert_eq!(c8(3).sub(&c8(5)), c8(254));
        assert_eq!(c8(7).mul(&c8(6)), c8(42));
        assert_eq!(c8(200).mul(&c8(2)), c8(144));
    }

    #[test]
    fn test_mul_keeps_trailing_zeros() {
        let mut even = c8(2);
        even.merge(&c8(6));
        let product = even.mul(&Bits::top(8));
        assert_eq!(product.zeros() & 1, 1);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(c8(0x81).shl(&c8(1)), c8(0x02));
        assert_eq!(c8(0x81).lshr(&c8(1)), c8(0x40));
        assert_eq!(c8(0x81).ashr(&c8(1)), c8(0xc0));
        assert!(c8(1).shl(&Bits::top(8)).is_top());
        assert!(c8(1).shl(&c8(8)).is_top());
    }

    #[test]
    fn test_division_requires_constants() {
        assert_eq!(c8(42).udiv(&c8(5)), c8(8));
        assert!(c8(42).udiv(&c8(0)).is_top());
        assert!(Bits::top(8).srem(&c8(3)).is_top());
    }

    #[test]
    fn test_icmp() {
        assert_eq!(c8(5).icmp(IntPredicate::Eq, &c8(5)), Bits::from_bool(Some(true)));
        let mut low = Bits::top(8);
        low.merge(&c8(0x0f));
        let high = Bits::from_masks(8, 0x80, 0);
        // low is unknown, bit 7 of high is known 1
        assert!(low.icmp(IntPredicate::Eq, &high).is_top());
        let small = Bits::from_masks(8, 0, 0xf0);
        assert_eq!(
            small.icmp(IntPredicate::Ult, &high),
            Bits::from_bool(Some(true))
        );
        assert_eq!(
            small.icmp(IntPredicate::Sgt, &high),
            Bits::from_bool(Some(true))
        );
    }

    #[test]
    fn test_casts() {
        let value = Bits::from_masks(8, 0x80, 0x01);
        assert_eq!(value.zext(16).zeros(), 0xff01);
        assert_eq!(value.sext(16).ones(), 0xff80);
        assert_eq!(value.trunc(4).ones(), 0);
        assert_eq!(value.trunc(4).zeros(), 1);
    }

    fn arb_bits() -> impl Strategy<Value = Bits> {
        prop_oneof![
            Just(Bits::bottom(8)),
            (any::<u8>(), any::<u8>()).prop_map(|(ones, zeros)| {
                let ones = u64::from(ones);
                Bits::from_masks(8, ones, u64::from(zeros) & !ones)
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_lattice_laws(a in arb_bits(), b in arb_bits(), c in arb_bits()) {
            laws::check_idempotent(&a);
            laws::check_commutative(&a, &b);
            laws::check_associative(&a, &b, &c);
            laws::check_monotone(&a, &b);
        }

        #[test]
        fn prop_add_is_sound(x in any::<u8>(), y in any::<u8>(), mx in any::<u8>(), my in any::<u8>()) {
            let (x, y) = (u64::from(x), u64::from(y));
            // Forget the bits selected by the masks, keep the rest known.
            let forget = |value: u64, mask: u8| {
                let keep = !u64::from(mask) & 0xff;
                Bits::from_masks(8, value & keep, !value & keep)
            };
            let sum = forget(x, mx).add(&forget(y, my));
            prop_assert!(sum.may_contain(&ApInt::new(8, x + y)));
            let product = forget(x, mx).mul(&forget(y, my));
            prop_assert!(product.may_contain(&ApInt::new(8, x * y)));
            let difference = forget(x, mx).sub(&forget(y, my));
            prop_assert!(difference.may_contain(&ApInt::new(8, x.wrapping_sub(y))));
        }
    }
}
