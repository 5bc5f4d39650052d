//! Reduced product of the numeric sub-domains.
//!
//! A [`Container`] holds a [`Bits`], an [`Enumeration`] and a [`Range`] value of the same
//! width, each describing a superset of the same concrete values. Operators run
//! independently on every member. Only the precision queries (bounds, single value,
//! accuracy) combine the members, each returning the tightest answer any member supplies.
//!
//! # Operands
//!
//! Binary operators accept either another container or a concrete [`ApInt`] through
//! [`IntegerOperand`]. A constant is converted into a temporary container for the duration
//! of the operation.

use std::{borrow::Cow, fmt};

use crate::{
    domain::{AccuracyValue, ApInt, Bits, Domain, Enumeration, InclusionBased, Range},
    ir::{BinaryOp, IntPredicate},
    utils::indent_except_first_line,
};

/// Right-hand operand of a container operation.
#[derive(Clone, Debug)]
pub enum IntegerOperand<'a> {
    /// An abstract integer.
    Container(&'a Container),
    /// A concrete integer.
    Constant(ApInt),
}

impl<'a> From<&'a Container> for IntegerOperand<'a> {
    fn from(value: &'a Container) -> Self {
        IntegerOperand::Container(value)
    }
}

impl From<ApInt> for IntegerOperand<'_> {
    fn from(value: ApInt) -> Self {
        IntegerOperand::Constant(value)
    }
}

impl<'a> IntegerOperand<'a> {
    fn resolve(self) -> Cow<'a, Container> {
        match self {
            IntegerOperand::Container(container) => Cow::Borrowed(container),
            IntegerOperand::Constant(value) => Cow::Owned(Container::from_constant(&value)),
        }
    }
}

/// Abstract integer combining bit, set and interval information.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Container {
    bits: Bits,
    enumeration: Enumeration,
    range: Range,
}

impl Container {
    /// No value.
    #[must_use]
    pub fn bottom(width: u32) -> Self {
        Self {
            bits: Bits::bottom(width),
            enumeration: Enumeration::bottom(width),
            range: Range::bottom(width),
        }
    }

    /// Every value of the width.
    #[must_use]
    pub fn top(width: u32) -> Self {
        Self {
            bits: Bits::top(width),
            enumeration: Enumeration::top(width),
            range: Range::top(width),
        }
    }

    /// A single concrete value, exact in every member.
    #[must_use]
    pub fn from_constant(value: &ApInt) -> Self {
        Self {
            bits: Bits::from_constant(value),
            enumeration: Enumeration::from_constant(value),
            range: Range::from_constant(value),
        }
    }

    /// Only interval information; the other members are top.
    #[must_use]
    pub fn from_range(range: Range) -> Self {
        let width = range.width();
        Self {
            bits: Bits::top(width),
            enumeration: Enumeration::top(width),
            range,
        }
    }

    /// Bit width shared by all members.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.bits.width()
    }

    /// The known-bits member.
    #[must_use]
    pub fn bits(&self) -> &Bits {
        &self.bits
    }

    /// The value-set member.
    #[must_use]
    pub fn enumeration(&self) -> &Enumeration {
        &self.enumeration
    }

    /// The interval member.
    #[must_use]
    pub fn range(&self) -> &Range {
        &self.range
    }

    fn check_width(&self, other: &Self) {
        invariant!(
            self.width() == other.width(),
            "container width mismatch: {} vs {}",
            self.width(),
            other.width()
        );
    }

    /// Tightest lower or upper bound over the members.
    fn tightest<F>(&self, query: F, keep_larger: bool, signed: bool) -> Option<ApInt>
    where
        F: Fn(&Self) -> [Option<ApInt>; 3],
    {
        if self.is_bottom() {
            return None;
        }
        query(self).into_iter().flatten().reduce(|a, b| {
            let a_less = if signed { a.slt(&b) } else { a.ult(&b) };
            if a_less == keep_larger {
                b
            } else {
                a
            }
        })
    }

    /// Smallest signed value any member can prove.
    #[must_use]
    pub fn signed_min(&self) -> Option<ApInt> {
        self.tightest(
            |c| {
                [
                    c.bits.signed_min(),
                    c.enumeration.signed_min(),
                    c.range.signed_min(),
                ]
            },
            true,
            true,
        )
    }

    /// Largest signed value any member can prove.
    #[must_use]
    pub fn signed_max(&self) -> Option<ApInt> {
        self.tightest(
            |c| {
                [
                    c.bits.signed_max(),
                    c.enumeration.signed_max(),
                    c.range.signed_max(),
                ]
            },
            false,
            true,
        )
    }

    /// Smallest unsigned value any member can prove.
    #[must_use]
    pub fn unsigned_min(&self) -> Option<ApInt> {
        self.tightest(
            |c| {
                [
                    c.bits.unsigned_min(),
                    c.enumeration.unsigned_min(),
                    c.range.unsigned_min(),
                ]
            },
            true,
            false,
        )
    }

    /// Largest unsigned value any member can prove.
    #[must_use]
    pub fn unsigned_max(&self) -> Option<ApInt> {
        self.tightest(
            |c| {
                [
                    c.bits.unsigned_max(),
                    c.enumeration.unsigned_max(),
                    c.range.unsigned_max(),
                ]
            },
            false,
            false,
        )
    }

    /// The only possible value, when the combined bounds collapse to a point.
    #[must_use]
    pub fn single_value(&self) -> Option<ApInt> {
        let min = self.unsigned_min()?;
        let max = self.unsigned_max()?;
        (min == max).then_some(min)
    }

    /// Returns `true` if every member admits `value`.
    #[must_use]
    pub fn may_contain(&self, value: &ApInt) -> bool {
        value.width() == self.width()
            && self.bits.may_contain(value)
            && self.enumeration.may_contain(value)
            && self.range.may_contain(value)
    }

    /// Applies a binary operator.
    ///
    /// # Panics
    ///
    /// Aborts the analysis for floating-point operators, which never reach integers in a
    /// validated module.
    #[must_use]
    pub fn binary<'a>(&self, op: BinaryOp, other: impl Into<IntegerOperand<'a>>) -> Self {
        let other = other.into().resolve();
        let other = other.as_ref();
        self.check_width(other);
        macro_rules! forward {
            ($method:ident) => {
                Self {
                    bits: self.bits.$method(&other.bits),
                    enumeration: self.enumeration.$method(&other.enumeration),
                    range: self.range.$method(&other.range),
                }
            };
        }
        match op {
            BinaryOp::Add => forward!(add),
            BinaryOp::Sub => forward!(sub),
            BinaryOp::Mul => forward!(mul),
            BinaryOp::UDiv => forward!(udiv),
            BinaryOp::SDiv => forward!(sdiv),
            BinaryOp::URem => forward!(urem),
            BinaryOp::SRem => forward!(srem),
            BinaryOp::Shl => forward!(shl),
            BinaryOp::LShr => forward!(lshr),
            BinaryOp::AShr => forward!(ashr),
            BinaryOp::And => forward!(and),
            BinaryOp::Or => forward!(or),
            BinaryOp::Xor => forward!(xor),
            BinaryOp::FAdd
            | BinaryOp::FSub
            | BinaryOp::FMul
            | BinaryOp::FDiv
            | BinaryOp::FRem => {
                invariant!(format!("floating-point operator {op} applied to an integer"))
            }
        }
    }

    /// Addition.
    #[must_use]
    pub fn add<'a>(&self, other: impl Into<IntegerOperand<'a>>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    /// Subtraction.
    #[must_use]
    pub fn sub<'a>(&self, other: impl Into<IntegerOperand<'a>>) -> Self {
        self.binary(BinaryOp::Sub, other)
    }

    /// Multiplication.
    #[must_use]
    pub fn mul<'a>(&self, other: impl Into<IntegerOperand<'a>>) -> Self {
        self.binary(BinaryOp::Mul, other)
    }

    /// Bitwise and.
    #[must_use]
    pub fn and<'a>(&self, other: impl Into<IntegerOperand<'a>>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Integer comparison producing a 1-bit container.
    #[must_use]
    pub fn icmp<'a>(&self, predicate: IntPredicate, other: impl Into<IntegerOperand<'a>>) -> Self {
        let other = other.into().resolve();
        let other = other.as_ref();
        self.check_width(other);
        Self {
            bits: self.bits.icmp(predicate, &other.bits),
            enumeration: self.enumeration.icmp(predicate, &other.enumeration),
            range: self.range.icmp(predicate, &other.range),
        }
    }

    /// Comparison of two pointers.
    ///
    /// Only pointers proven to target a single location give a definite answer; every
    /// other case is top.
    #[must_use]
    pub fn icmp_pointers(
        predicate: IntPredicate,
        left: &InclusionBased,
        right: &InclusionBased,
    ) -> Self {
        let single = left.is_single_target() && right.is_single_target();
        let equal = single && left.same_targets(right);
        let result = match predicate {
            IntPredicate::Eq
            | IntPredicate::Uge
            | IntPredicate::Ule
            | IntPredicate::Sge
            | IntPredicate::Sle
                if equal =>
            {
                Some(true)
            }
            IntPredicate::Eq if single => Some(false),
            IntPredicate::Ne if single => Some(!equal),
            _ => None,
        };
        match result {
            Some(value) => Self::from_constant(&ApInt::from_bool(value)),
            None => Self::top(1),
        }
    }

    /// Keeps the low `width` bits.
    #[must_use]
    pub fn trunc(&self, width: u32) -> Self {
        Self {
            bits: self.bits.trunc(width),
            enumeration: self.enumeration.trunc(width),
            range: self.range.trunc(width),
        }
    }

    /// Zero-extends to `width` bits.
    #[must_use]
    pub fn zext(&self, width: u32) -> Self {
        Self {
            bits: self.bits.zext(width),
            enumeration: self.enumeration.zext(width),
            range: self.range.zext(width),
        }
    }

    /// Sign-extends to `width` bits.
    #[must_use]
    pub fn sext(&self, width: u32) -> Self {
        Self {
            bits: self.bits.sext(width),
            enumeration: self.enumeration.sext(width),
            range: self.range.sext(width),
        }
    }
}

impl Domain for Container {
    fn merge(&mut self, other: &Self) {
        self.check_width(other);
        self.bits.merge(&other.bits);
        self.enumeration.merge(&other.enumeration);
        self.range.merge(&other.range);
    }

    fn widen(&mut self, other: &Self) {
        self.check_width(other);
        self.bits.widen(&other.bits);
        self.enumeration.widen(&other.enumeration);
        self.range.widen(&other.range);
    }

    fn memory_usage(&self) -> usize {
        self.bits.memory_usage() + self.enumeration.memory_usage() + self.range.memory_usage()
    }
}

impl AccuracyValue for Container {
    fn accuracy(&self) -> f32 {
        self.bits
            .accuracy()
            .max(self.enumeration.accuracy())
            .max(self.range.accuracy())
    }

    fn is_bottom(&self) -> bool {
        self.bits.is_bottom() && self.enumeration.is_bottom() && self.range.is_bottom()
    }

    fn set_bottom(&mut self) {
        self.bits.set_bottom();
        self.enumeration.set_bottom();
        self.range.set_bottom();
    }

    fn is_top(&self) -> bool {
        self.bits.is_top() && self.enumeration.is_top() && self.range.is_top()
    }

    fn set_top(&mut self) {
        self.bits.set_top();
        self.enumeration.set_top();
        self.range.set_top();
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.width();
        if self.is_bottom() {
            return write!(f, "i{width} bottom");
        }
        if self.is_top() {
            return write!(f, "i{width} top");
        }
        if let Some(value) = self.single_value() {
            return write!(f, "i{width} {value}");
        }
        let body = format!(
            "i{width}\n{}\n{}\n{}",
            self.bits, self.enumeration, self.range
        );
        write!(f, "{}", indent_except_first_line(&body, 2))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        domain::lattice::laws,
        ir::{BlockId, FunctionId, InstrRef, Place},
    };

    fn c8(value: u64) -> Container {
        Container::from_constant(&ApInt::new(8, value))
    }

    fn joined(values: &[u64]) -> Container {
        let mut result = Container::bottom(8);
        for value in values {
            result.merge(&c8(*value));
        }
        result
    }

    #[test]
    fn test_forwarding_and_constants() {
        let sum = c8(5).add(ApInt::new(8, 3));
        assert_eq!(sum.single_value(), Some(ApInt::new(8, 8)));
        assert_eq!(c8(5).and(&c8(3)), c8(1));
    }

    #[test]
    fn test_queries_take_tightest_member() {
        // bits know the low bit is clear, the enumeration knows the exact set
        let value = joined(&[2, 10]);
        assert_eq!(value.unsigned_min(), Some(ApInt::new(8, 2)));
        assert_eq!(value.unsigned_max(), Some(ApInt::new(8, 10)));
        assert!(value.single_value().is_none());
        assert!(value.may_contain(&ApInt::new(8, 10)));
        assert!(!value.may_contain(&ApInt::new(8, 6)));

        let ranged = Container::from_range(Range::unsigned(&ApInt::new(8, 3), &ApInt::new(8, 9)));
        assert_eq!(ranged.unsigned_max(), Some(ApInt::new(8, 9)));
        assert_eq!(ranged.signed_min(), Some(ApInt::new(8, 3)));
    }

    #[test]
    fn test_top_and_bottom_need_all_members() {
        assert!(Container::top(8).is_top());
        assert!(Container::bottom(8).is_bottom());
        let partial = Container::from_range(Range::top(8));
        assert!(partial.is_top());
        let ranged = Container::from_range(Range::unsigned(&ApInt::new(8, 0), &ApInt::new(8, 1)));
        assert!(!ranged.is_top());
        assert_eq!(ranged.accuracy(), ranged.range().accuracy());
    }

    #[test]
    fn test_icmp() {
        let small = joined(&[1, 2, 3]);
        let result = small.icmp(IntPredicate::Ult, ApInt::new(8, 4));
        assert_eq!(result.single_value(), Some(ApInt::from_bool(true)));
        let unknown = small.icmp(IntPredicate::Eq, ApInt::new(8, 2));
        assert!(unknown.single_value().is_none());
    }

    #[test]
    fn test_pointer_comparison() {
        let place = Place::Instruction(InstrRef::new(FunctionId::new(0), BlockId::new(0), 0));
        let other = Place::Instruction(InstrRef::new(FunctionId::new(0), BlockId::new(0), 1));
        let mut a = InclusionBased::new();
        a.add_memory_target(place, place, None);
        let mut b = InclusionBased::new();
        b.add_memory_target(other, other, None);

        let same = Container::icmp_pointers(IntPredicate::Eq, &a, &a.clone());
        assert_eq!(same.single_value(), Some(ApInt::from_bool(true)));
        let differ = Container::icmp_pointers(IntPredicate::Eq, &a, &b);
        assert_eq!(differ.single_value(), Some(ApInt::from_bool(false)));
        let ne = Container::icmp_pointers(IntPredicate::Ne, &a, &b);
        assert_eq!(ne.single_value(), Some(ApInt::from_bool(true)));
        let ordered = Container::icmp_pointers(IntPredicate::Ult, &a, &b);
        assert!(ordered.is_top());

        let mut both = a.clone();
        both.merge(&b);
        assert!(Container::icmp_pointers(IntPredicate::Eq, &both, &a).is_top());
    }

    #[test]
    #[should_panic(expected = "soundness invariant violated")]
    fn test_width_mismatch_faults() {
        let mut a = c8(1);
        a.merge(&Container::from_constant(&ApInt::new(16, 1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(c8(5).to_string(), "i8 0x5 (5)");
        assert_eq!(Container::top(32).to_string(), "i32 top");
        let rendered = joined(&[1, 3]).to_string();
        assert!(rendered.starts_with("i8\n  bits 0b000000?1\n  enum {"));
    }

    fn arb_container() -> impl Strategy<Value = Container> {
        prop_oneof![
            Just(Container::top(8)),
            prop::collection::vec(any::<u8>(), 0..6)
                .prop_map(|values| joined(&values.into_iter().map(u64::from).collect::<Vec<_>>())),
        ]
    }

    proptest! {
        #[test]
        fn prop_lattice_laws(a in arb_container(), b in arb_container(), c in arb_container()) {
            laws::check_idempotent(&a);
            laws::check_commutative(&a, &b);
            laws::check_associative(&a, &b, &c);
            laws::check_monotone(&a, &b);
        }

        #[test]
        fn prop_bounds_bracket_members(values in prop::collection::vec(any::<u8>(), 1..6)) {
            let container = joined(&values.iter().copied().map(u64::from).collect::<Vec<_>>());
            let min = container.unsigned_min().unwrap();
            let max = container.unsigned_max().unwrap();
            let smin = container.signed_min().unwrap();
            let smax = container.signed_max().unwrap();
            for value in values {
                let value = ApInt::new(8, u64::from(value));
                prop_assert!(min.ule(&value) && value.ule(&max));
                prop_assert!(smin.sle(&value) && value.sle(&smax));
                prop_assert!(container.may_contain(&value));
            }
            if let Some(single) = container.single_value() {
                prop_assert!(container.bits().may_contain(&single));
                prop_assert!(container.enumeration().may_contain(&single));
                prop_assert!(container.range().may_contain(&single));
            }
        }
    }
}
