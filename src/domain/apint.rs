//! Fixed-width bitvector arithmetic.
//!
//! [`ApInt`] is the concrete integer every numeric domain is built from: a bit pattern of
//! `1..=64` bits stored in a `u64` that is always masked to its width. The type carries no
//! signedness; every operation that depends on it comes in a signed and an unsigned flavour,
//! exactly like the machine instructions of the analysed program.
//!
//! Operations that can overflow come in two shapes:
//!
//! - `wrapping_*` returns the result modulo `2^width`
//! - `*_ov` returns the wrapped result together with an overflow flag
//!
//! Division, remainder and shifts return `None` when the concrete operation is undefined
//! (zero divisor, shift amount not smaller than the width).

use std::{cmp::Ordering, fmt};

use crate::{Error, Result};

/// Largest supported integer width.
pub const MAX_WIDTH: u32 = 64;

/// Returns the value mask for `width` bits.
#[must_use]
pub const fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Aborts the analysis on a width outside of `1..=64`.
///
/// Widths are validated when a module is built, so reaching this with a bad width is an
/// internal fault.
pub(crate) fn check_supported_width(width: u32) {
    invariant!(
        (1..=MAX_WIDTH).contains(&width),
        "unsupported integer width {}",
        width
    );
}

/// A fixed-width integer bit pattern.
///
/// Ordering compares the unsigned readings, which is the order the enumeration domain keeps
/// its members in. Values of different widths are never compared by the domains.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ApInt {
    value: u64,
    width: u32,
}

impl ApInt {
    /// Creates a value of `width` bits, truncating `value` to that width.
    ///
    /// # Panics
    ///
    /// Panics when `width` is outside of `1..=64`; widths are validated when a module is
    /// built, so reaching this with a bad width is an internal fault.
    #[must_use]
    pub fn new(width: u32, value: u64) -> Self {
        check_supported_width(width);
        Self {
            value: value & width_mask(width),
            width,
        }
    }

    /// Creates a value of `width` bits, rejecting unsupported widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWidth`] when `width` is outside of `1..=64`.
    pub fn try_new(width: u32, value: u64) -> Result<Self> {
        if (1..=MAX_WIDTH).contains(&width) {
            Ok(Self::new(width, value))
        } else {
            Err(Error::InvalidWidth(width))
        }
    }

    /// Creates a value from a signed integer, using two's complement truncation.
    #[must_use]
    pub fn from_signed(width: u32, value: i64) -> Self {
        Self::new(width, value as u64)
    }

    /// Creates a 1-bit boolean.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        Self::new(1, u64::from(value))
    }

    /// The all-zero value.
    #[must_use]
    pub fn zero(width: u32) -> Self {
        Self::new(width, 0)
    }

    /// The value one.
    #[must_use]
    pub fn one(width: u32) -> Self {
        Self::new(width, 1)
    }

    /// Largest unsigned value (all bits set).
    #[must_use]
    pub fn umax(width: u32) -> Self {
        Self::new(width, u64::MAX)
    }

    /// Smallest signed value (only the sign bit set).
    #[must_use]
    pub fn smin(width: u32) -> Self {
        Self::new(width, 1u64 << (width - 1))
    }

    /// Largest signed value (all bits but the sign bit set).
    #[must_use]
    pub fn smax(width: u32) -> Self {
        Self::new(width, width_mask(width) >> 1)
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Unsigned reading.
    #[must_use]
    pub const fn zext_value(&self) -> u64 {
        self.value
    }

    /// Signed (two's complement) reading.
    #[must_use]
    pub const fn sext_value(&self) -> i64 {
        let shift = 64 - self.width;
        ((self.value << shift) as i64) >> shift
    }

    /// Value mask of this width.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        width_mask(self.width)
    }

    /// Returns `true` if all bits are clear.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns `true` if the sign bit is set.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.value >> (self.width - 1) & 1 == 1
    }

    /// Returns `true` if this is the smallest signed value.
    #[must_use]
    pub fn is_smin(&self) -> bool {
        *self == Self::smin(self.width)
    }

    /// Returns `true` if all bits are set.
    #[must_use]
    pub const fn is_all_ones(&self) -> bool {
        self.value == width_mask(self.width)
    }

    /// Tests a single bit.
    #[must_use]
    pub const fn bit(&self, index: u32) -> bool {
        self.value >> index & 1 == 1
    }

    fn with(&self, value: u64) -> Self {
        Self::new(self.width, value)
    }

    fn check_width(&self, other: &Self) {
        invariant!(
            self.width == other.width,
            "operand width mismatch: {} vs {}",
            self.width,
            other.width
        );
    }

    /// Modular addition.
    #[must_use]
    pub fn wrapping_add(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value.wrapping_add(other.value))
    }

    /// Modular subtraction.
    #[must_use]
    pub fn wrapping_sub(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value.wrapping_sub(other.value))
    }

    /// Modular multiplication.
    #[must_use]
    pub fn wrapping_mul(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value.wrapping_mul(other.value))
    }

    /// Two's complement negation.
    #[must_use]
    pub fn wrapping_neg(&self) -> Self {
        self.with(self.value.wrapping_neg())
    }

    /// Unsigned addition with overflow flag.
    #[must_use]
    pub fn uadd_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        let wide = u128::from(self.value) + u128::from(other.value);
        (self.with(wide as u64), wide > u128::from(self.mask()))
    }

    /// Signed addition with overflow flag.
    #[must_use]
    pub fn sadd_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        let wide = i128::from(self.sext_value()) + i128::from(other.sext_value());
        (self.with(wide as u64), !self.fits_signed(wide))
    }

    /// Unsigned subtraction with overflow (borrow) flag.
    #[must_use]
    pub fn usub_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        (self.wrapping_sub(other), self.value < other.value)
    }

    /// Signed subtraction with overflow flag.
    #[must_use]
    pub fn ssub_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        let wide = i128::from(self.sext_value()) - i128::from(other.sext_value());
        (self.with(wide as u64), !self.fits_signed(wide))
    }

    /// Unsigned multiplication with overflow flag.
    #[must_use]
    pub fn umul_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        let wide = u128::from(self.value) * u128::from(other.value);
        (self.with(wide as u64), wide > u128::from(self.mask()))
    }

    /// Signed multiplication with overflow flag.
    #[must_use]
    pub fn smul_ov(&self, other: &Self) -> (Self, bool) {
        self.check_width(other);
        let wide = i128::from(self.sext_value()) * i128::from(other.sext_value());
        (self.with(wide as u64), !self.fits_signed(wide))
    }

    fn fits_signed(&self, wide: i128) -> bool {
        let min = i128::from(Self::smin(self.width).sext_value());
        let max = i128::from(Self::smax(self.width).sext_value());
        (min..=max).contains(&wide)
    }

    /// Unsigned division, `None` for a zero divisor.
    #[must_use]
    pub fn udiv(&self, other: &Self) -> Option<Self> {
        self.check_width(other);
        self.value.checked_div(other.value).map(|v| self.with(v))
    }

    /// Unsigned remainder, `None` for a zero divisor.
    #[must_use]
    pub fn urem(&self, other: &Self) -> Option<Self> {
        self.check_width(other);
        self.value.checked_rem(other.value).map(|v| self.with(v))
    }

    /// Signed division with overflow flag, `None` for a zero divisor.
    ///
    /// The only overflowing case is `MIN / -1`, which wraps to `MIN`.
    #[must_use]
    pub fn sdiv_ov(&self, other: &Self) -> Option<(Self, bool)> {
        self.check_width(other);
        if other.is_zero() {
            return None;
        }
        let wide = i128::from(self.sext_value()) / i128::from(other.sext_value());
        Some((self.with(wide as u64), !self.fits_signed(wide)))
    }

    /// Signed (truncating) division, `None` for a zero divisor.
    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Option<Self> {
        self.sdiv_ov(other).map(|(value, _)| value)
    }

    /// Signed remainder with the sign of the dividend, `None` for a zero divisor.
    #[must_use]
    pub fn srem(&self, other: &Self) -> Option<Self> {
        self.check_width(other);
        if other.is_zero() {
            return None;
        }
        let wide = i128::from(self.sext_value()) % i128::from(other.sext_value());
        Some(self.with(wide as u64))
    }

    fn shift_amount(&self, amount: &Self) -> Option<u32> {
        let amount = amount.zext_value();
        if amount < u64::from(self.width) {
            u32::try_from(amount).ok()
        } else {
            None
        }
    }

    /// Left shift, `None` when the amount is not smaller than the width.
    #[must_use]
    pub fn shl(&self, amount: &Self) -> Option<Self> {
        self.shift_amount(amount)
            .map(|amount| self.with(self.value << amount))
    }

    /// Logical right shift, `None` when the amount is not smaller than the width.
    #[must_use]
    pub fn lshr(&self, amount: &Self) -> Option<Self> {
        self.shift_amount(amount)
            .map(|amount| self.with(self.value >> amount))
    }

    /// Arithmetic right shift, `None` when the amount is not smaller than the width.
    #[must_use]
    pub fn ashr(&self, amount: &Self) -> Option<Self> {
        self.shift_amount(amount)
            .map(|amount| self.with((self.sext_value() >> amount) as u64))
    }

    /// Bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value & other.value)
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value | other.value)
    }

    /// Bitwise exclusive or.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.check_width(other);
        self.with(self.value ^ other.value)
    }

    /// Bitwise complement.
    #[must_use]
    pub fn not(&self) -> Self {
        self.with(!self.value)
    }

    /// Keeps the low `width` bits.
    #[must_use]
    pub fn trunc(&self, width: u32) -> Self {
        Self::new(width, self.value)
    }

    /// Zero-extends (or truncates) to `width` bits.
    #[must_use]
    pub fn zext(&self, width: u32) -> Self {
        Self::new(width, self.value)
    }

    /// Sign-extends (or truncates) to `width` bits.
    #[must_use]
    pub fn sext(&self, width: u32) -> Self {
        Self::new(width, self.sext_value() as u64)
    }

    /// Compares the signed readings.
    #[must_use]
    pub fn cmp_signed(&self, other: &Self) -> Ordering {
        self.check_width(other);
        self.sext_value().cmp(&other.sext_value())
    }

    /// Compares the unsigned readings.
    #[must_use]
    pub fn cmp_unsigned(&self, other: &Self) -> Ordering {
        self.check_width(other);
        self.value.cmp(&other.value)
    }

    /// Signed less-than.
    #[must_use]
    pub fn slt(&self, other: &Self) -> bool {
        self.cmp_signed(other) == Ordering::Less
    }

    /// Signed less-or-equal.
    #[must_use]
    pub fn sle(&self, other: &Self) -> bool {
        self.cmp_signed(other) != Ordering::Greater
    }

    /// Unsigned less-than.
    #[must_use]
    pub fn ult(&self, other: &Self) -> bool {
        self.cmp_unsigned(other) == Ordering::Less
    }

    /// Unsigned less-or-equal.
    #[must_use]
    pub fn ule(&self, other: &Self) -> bool {
        self.cmp_unsigned(other) != Ordering::Greater
    }

    /// Smaller of two values under the signed ordering.
    #[must_use]
    pub fn smin_of(self, other: Self) -> Self {
        if self.slt(&other) {
            self
        } else {
            other
        }
    }

    /// Larger of two values under the signed ordering.
    #[must_use]
    pub fn smax_of(self, other: Self) -> Self {
        if self.slt(&other) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ApInt {
    /// Renders as `0x.. (dec)`, or `0x.. (unsigned U, signed S)` when the two readings differ.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unsigned = self.zext_value();
        let signed = self.sext_value();
        if signed >= 0 {
            write!(f, "{unsigned:#x} ({unsigned})")
        } else {
            write!(f, "{unsigned:#x} (unsigned {unsigned}, signed {signed})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i8v(value: i64) -> ApInt {
        ApInt::from_signed(8, value)
    }

    #[test]
    fn test_masking_and_readings() {
        let v = ApInt::new(8, 0x1ff);
        assert_eq!(v.zext_value(), 0xff);
        assert_eq!(v.sext_value(), -1);
        assert!(v.is_negative());
        assert!(v.is_all_ones());
        assert_eq!(ApInt::smin(8).sext_value(), -128);
        assert_eq!(ApInt::smax(8).zext_value(), 127);
        assert_eq!(ApInt::umax(64).zext_value(), u64::MAX);
    }

    #[test]
    fn test_try_new_rejects_width() {
        assert!(ApInt::try_new(0, 1).is_err());
        assert!(ApInt::try_new(65, 1).is_err());
        assert!(ApInt::try_new(64, 1).is_ok());
    }

    #[test]
    fn test_overflow_flags() {
        let (sum, ov) = ApInt::new(8, 250).uadd_ov(&ApInt::new(8, 10));
        assert!(ov);
        assert_eq!(sum.zext_value(), 4);

        let (_, ov) = i8v(100).sadd_ov(&i8v(27));
        assert!(!ov);
        let (_, ov) = i8v(100).sadd_ov(&i8v(28));
        assert!(ov);

        let (_, ov) = ApInt::new(8, 3).usub_ov(&ApInt::new(8, 4));
        assert!(ov);
        let (_, ov) = i8v(-128).ssub_ov(&i8v(1));
        assert!(ov);

        let (_, ov) = ApInt::new(8, 16).umul_ov(&ApInt::new(8, 16));
        assert!(ov);
        let (prod, ov) = i8v(-8).smul_ov(&i8v(16));
        assert!(!ov);
        assert_eq!(prod.sext_value(), -128);

        let (quot, ov) = i8v(-128).sdiv_ov(&i8v(-1)).unwrap();
        assert!(ov);
        assert_eq!(quot, ApInt::smin(8));
    }

    #[test]
    fn test_division_by_zero() {
        let zero = ApInt::zero(8);
        let one = ApInt::one(8);
        assert!(one.udiv(&zero).is_none());
        assert!(one.sdiv(&zero).is_none());
        assert!(one.urem(&zero).is_none());
        assert!(one.srem(&zero).is_none());
        assert_eq!(i8v(-7).srem(&i8v(2)).unwrap().sext_value(), -1);
        assert_eq!(i8v(-7).sdiv(&i8v(2)).unwrap().sext_value(), -3);
    }

    #[test]
    fn test_shifts() {
        let v = i8v(-16);
        assert_eq!(v.ashr(&ApInt::new(8, 2)).unwrap().sext_value(), -4);
        assert_eq!(v.lshr(&ApInt::new(8, 2)).unwrap().zext_value(), 0x3c);
        assert_eq!(ApInt::new(8, 1).shl(&ApInt::new(8, 7)).unwrap().zext_value(), 0x80);
        assert!(v.shl(&ApInt::new(8, 8)).is_none());
    }

    #[test]
    fn test_casts() {
        let v = i8v(-2);
        assert_eq!(v.zext(16).zext_value(), 0xfe);
        assert_eq!(v.sext(16).zext_value(), 0xfffe);
        assert_eq!(ApInt::new(16, 0x1234).trunc(8).zext_value(), 0x34);
    }

    #[test]
    fn test_display() {
        assert_eq!(ApInt::new(8, 5).to_string(), "0x5 (5)");
        assert_eq!(i8v(-1).to_string(), "0xff (unsigned 255, signed -1)");
    }
}
