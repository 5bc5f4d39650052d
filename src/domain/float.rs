//! Interval abstraction of IEEE double values.
//!
//! [`FloatRange`] follows the same contract as the integer domains: bottom, top (which also
//! covers NaN), a closed interval in between, and monotone operators. Any operation that may
//! produce NaN goes to top.

use std::fmt;

use crate::{
    domain::{AccuracyValue, ApInt, Container, Domain, Range},
    ir::FloatPredicate,
};

/// Floating-point interval.
#[derive(Clone, Debug)]
pub struct FloatRange {
    empty: bool,
    top: bool,
    from: f64,
    to: f64,
}

impl PartialEq for FloatRange {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_known(), other.is_known()) {
            (true, true) => {
                self.from.to_bits() == other.from.to_bits() && self.to.to_bits() == other.to.to_bits()
            }
            (false, false) => self.empty == other.empty && self.top == other.top,
            _ => false,
        }
    }
}

impl FloatRange {
    /// No value.
    #[must_use]
    pub fn bottom() -> Self {
        Self {
            empty: true,
            top: false,
            from: 0.0,
            to: 0.0,
        }
    }

    /// Every value, including NaN.
    #[must_use]
    pub fn top() -> Self {
        Self {
            empty: false,
            top: true,
            from: 0.0,
            to: 0.0,
        }
    }

    /// A single value.
    #[must_use]
    pub fn from_constant(value: f64) -> Self {
        Self::interval(value, value)
    }

    /// `[from, to]`; NaN bounds or `from > to` give top.
    #[must_use]
    pub fn interval(from: f64, to: f64) -> Self {
        if from.is_nan() || to.is_nan() || from > to {
            Self::top()
        } else {
            Self {
                empty: false,
                top: false,
                from,
                to,
            }
        }
    }

    fn is_known(&self) -> bool {
        !self.empty && !self.top
    }

    /// Lower bound, if known.
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.is_known().then_some(self.from)
    }

    /// Upper bound, if known.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.is_known().then_some(self.to)
    }

    /// The only value, if the interval is a point.
    #[must_use]
    pub fn single_value(&self) -> Option<f64> {
        (self.is_known() && self.from.to_bits() == self.to.to_bits()).then_some(self.from)
    }

    fn lift<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&Self, &Self) -> Self,
    {
        if self.empty || other.empty {
            Self::bottom()
        } else if self.top || other.top {
            Self::top()
        } else {
            f(self, other)
        }
    }

    fn corners<F>(a: &Self, b: &Self, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let values = [f(a.from, b.from), f(a.from, b.to), f(a.to, b.from), f(a.to, b.to)];
        if values.iter().any(|v| v.is_nan()) {
            return Self::top();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::interval(min, max)
    }

    /// Addition.
    #[must_use]
    pub fn fadd(&self, other: &Self) -> Self {
        self.lift(other, |a, b| Self::corners(a, b, |x, y| x + y))
    }

    /// Subtraction.
    #[must_use]
    pub fn fsub(&self, other: &Self) -> Self {
        self.lift(other, |a, b| Self::corners(a, b, |x, y| x - y))
    }

    /// Multiplication.
    #[must_use]
    pub fn fmul(&self, other: &Self) -> Self {
        self.lift(other, |a, b| Self::corners(a, b, |x, y| x * y))
    }

    /// Division; a divisor interval containing zero gives top.
    #[must_use]
    pub fn fdiv(&self, other: &Self) -> Self {
        self.lift(other, |a, b| {
            if b.from <= 0.0 && b.to >= 0.0 {
                Self::top()
            } else {
                Self::corners(a, b, |x, y| x / y)
            }
        })
    }

    /// Remainder; exact on points, top otherwise.
    #[must_use]
    pub fn frem(&self, other: &Self) -> Self {
        self.lift(other, |a, b| match (a.single_value(), b.single_value()) {
            (Some(x), Some(y)) if y != 0.0 => Self::interval(x % y, x % y),
            _ => Self::top(),
        })
    }

    /// Comparison producing a 1-bit integer.
    #[must_use]
    pub fn fcmp(&self, predicate: FloatPredicate, other: &Self) -> Container {
        if self.empty || other.empty {
            return Container::bottom(1);
        }
        let decided = match predicate {
            FloatPredicate::True => Some(true),
            FloatPredicate::False => Some(false),
            _ if self.top || other.top => None,
            // Neither operand may be NaN from here on.
            FloatPredicate::Ord => Some(true),
            FloatPredicate::Uno => Some(false),
            FloatPredicate::Oeq | FloatPredicate::Ueq => self.equal(other),
            FloatPredicate::One | FloatPredicate::Une => self.equal(other).map(|e| !e),
            FloatPredicate::Olt | FloatPredicate::Ult => Self::less(self, other),
            FloatPredicate::Ole | FloatPredicate::Ule => Self::less_equal(self, other),
            FloatPredicate::Ogt | FloatPredicate::Ugt => Self::less(other, self),
            FloatPredicate::Oge | FloatPredicate::Uge => Self::less_equal(other, self),
        };
        match decided {
            Some(value) => Container::from_constant(&ApInt::from_bool(value)),
            None => Container::top(1),
        }
    }

    fn equal(&self, other: &Self) -> Option<bool> {
        if self.single_value().is_some() && self.single_value() == other.single_value() {
            Some(true)
        } else if self.to < other.from || other.to < self.from {
            Some(false)
        } else {
            None
        }
    }

    fn less(a: &Self, b: &Self) -> Option<bool> {
        if a.to < b.from {
            Some(true)
        } else if a.from >= b.to {
            Some(false)
        } else {
            None
        }
    }

    fn less_equal(a: &Self, b: &Self) -> Option<bool> {
        if a.to <= b.from {
            Some(true)
        } else if a.from > b.to {
            Some(false)
        } else {
            None
        }
    }

    /// Conversion to an integer of `width` bits, truncating toward zero.
    ///
    /// Values outside of the target range are undefined, so the result is top unless the
    /// whole interval converts.
    #[must_use]
    pub fn to_integer(&self, width: u32, signed: bool) -> Container {
        if self.empty {
            return Container::bottom(width);
        }
        let (Some(from), Some(to)) = (self.min(), self.max()) else {
            return Container::top(width);
        };
        let (from, to) = (from.trunc(), to.trunc());
        let (min, max) = if signed {
            let bound = 2f64.powi(width as i32 - 1);
            (-bound, bound - 1.0)
        } else {
            (0.0, 2f64.powi(width as i32) - 1.0)
        };
        if from < min || to > max {
            return Container::top(width);
        }
        let convert = |v: f64| {
            if signed {
                ApInt::from_signed(width, v as i64)
            } else {
                ApInt::new(width, v as u64)
            }
        };
        if from == to {
            return Container::from_constant(&convert(from));
        }
        let range = if signed {
            Range::signed(&convert(from), &convert(to))
        } else {
            Range::unsigned(&convert(from), &convert(to))
        };
        Container::from_range(range)
    }

    /// Conversion from an integer, using its tightest bounds under the given reading.
    #[must_use]
    pub fn from_integer(value: &Container, signed: bool) -> Self {
        if value.is_bottom() {
            return Self::bottom();
        }
        let bounds = if signed {
            value
                .signed_min()
                .zip(value.signed_max())
                .map(|(a, b)| (a.sext_value() as f64, b.sext_value() as f64))
        } else {
            value
                .unsigned_min()
                .zip(value.unsigned_max())
                .map(|(a, b)| (a.zext_value() as f64, b.zext_value() as f64))
        };
        let (from, to) = bounds.unwrap_or_else(|| {
            let width = value.width();
            if signed {
                let bound = 2f64.powi(width as i32 - 1);
                (-bound, bound - 1.0)
            } else {
                (0.0, 2f64.powi(width as i32) - 1.0)
            }
        });
        Self::interval(from, to)
    }
}

impl Domain for FloatRange {
    fn merge(&mut self, other: &Self) {
        if other.empty || self.top {
            return;
        }
        if self.empty || other.top {
            *self = other.clone();
            return;
        }
        self.from = self.from.min(other.from);
        self.to = self.to.max(other.to);
    }

    fn widen(&mut self, other: &Self) {
        if other.empty || self.top {
            return;
        }
        if self.empty || other.top {
            *self = other.clone();
            return;
        }
        if other.from < self.from {
            self.from = f64::NEG_INFINITY;
        }
        if other.to > self.to {
            self.to = f64::INFINITY;
        }
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl AccuracyValue for FloatRange {
    fn accuracy(&self) -> f32 {
        if self.empty || self.single_value().is_some() {
            1.0
        } else if self.top {
            0.0
        } else {
            0.5
        }
    }

    fn is_bottom(&self) -> bool {
        self.empty
    }

    fn set_bottom(&mut self) {
        *self = Self::bottom();
    }

    fn is_top(&self) -> bool {
        self.top
    }

    fn set_top(&mut self) {
        *self = Self::top();
    }
}

impl fmt::Display for FloatRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            write!(f, "float bottom")
        } else if self.top {
            write!(f, "float top")
        } else if let Some(value) = self.single_value() {
            write!(f, "float {value:?}")
        } else {
            write!(f, "float [{:?}, {:?}]", self.from, self.to)
        }
    }
}
