//! Instructions of the program representation.
//!
//! Every instruction is `result = op(operands)` with a static result type. Operands are
//! either places (arguments, results of earlier instructions, globals) or constants. A
//! global used as an operand denotes the address of the global, never its contents.
//!
//! # Operation Categories
//!
//! - **Arithmetic**: [`BinaryOp`] over integers and floats
//! - **Comparison**: [`IntPredicate`] and [`FloatPredicate`]
//! - **Conversion**: [`CastOp`]
//! - **Memory**: `alloca`, `load`, `store`, `getelementptr`
//! - **Data flow**: `select`, `phi`, `call`
//! - **Control flow**: `ret`, `br`, `condbr`, `unreachable`

#![allow(missing_docs)]

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    domain::ApInt,
    ir::{BlockId, FunctionId, IrType, Place},
};

/// A literal operand.
#[derive(Clone, PartialEq, Debug)]
pub enum Constant {
    /// Integer literal; its width is the operand width.
    Int(ApInt),
    /// Double literal.
    Float(f64),
    /// The null pointer.
    Null,
    /// An undefined value of the given type.
    Undef(IrType),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) if value.width() == 1 => write!(f, "i1 {}", !value.is_zero()),
            Constant::Int(value) => write!(f, "i{} {}", value.width(), value.sext_value()),
            Constant::Float(value) => write!(f, "double {value}"),
            Constant::Null => write!(f, "null"),
            Constant::Undef(ty) => write!(f, "{ty} undef"),
        }
    }
}

/// An instruction input.
#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    /// The value produced at a place.
    Place(Place),
    /// A literal.
    Constant(Constant),
}

impl Operand {
    /// Integer literal operand.
    #[must_use]
    pub fn int(width: u32, value: u64) -> Self {
        Operand::Constant(Constant::Int(ApInt::new(width, value)))
    }

    /// Double literal operand.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Operand::Constant(Constant::Float(value))
    }

    /// The null pointer.
    #[must_use]
    pub fn null() -> Self {
        Operand::Constant(Constant::Null)
    }

    /// The place, if the operand is not a literal.
    #[must_use]
    pub fn as_place(&self) -> Option<Place> {
        match self {
            Operand::Place(place) => Some(*place),
            Operand::Constant(_) => None,
        }
    }
}

impl From<Place> for Operand {
    fn from(value: Place) -> Self {
        Operand::Place(value)
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Operand::Constant(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Place(place) => place.fmt(f),
            Operand::Constant(constant) => constant.fmt(f),
        }
    }
}

/// Two-operand arithmetic and bitwise operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    /// Returns `true` for the floating-point operators.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

/// Integer comparison predicates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    /// Returns `true` for the predicates reading their operands as signed.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntPredicate::Sgt | IntPredicate::Sge | IntPredicate::Slt | IntPredicate::Sle
        )
    }

    /// The predicate with its operands exchanged.
    #[must_use]
    pub fn swapped(self) -> Self {
        match self {
            IntPredicate::Eq | IntPredicate::Ne => self,
            IntPredicate::Ugt => IntPredicate::Ult,
            IntPredicate::Uge => IntPredicate::Ule,
            IntPredicate::Ult => IntPredicate::Ugt,
            IntPredicate::Ule => IntPredicate::Uge,
            IntPredicate::Sgt => IntPredicate::Slt,
            IntPredicate::Sge => IntPredicate::Sle,
            IntPredicate::Slt => IntPredicate::Sgt,
            IntPredicate::Sle => IntPredicate::Sge,
        }
    }

    /// Applies the predicate to two concrete integers.
    #[must_use]
    pub fn evaluate(self, a: &ApInt, b: &ApInt) -> bool {
        match self {
            IntPredicate::Eq => a == b,
            IntPredicate::Ne => a != b,
            IntPredicate::Ugt => b.ult(a),
            IntPredicate::Uge => b.ule(a),
            IntPredicate::Ult => a.ult(b),
            IntPredicate::Ule => a.ule(b),
            IntPredicate::Sgt => b.slt(a),
            IntPredicate::Sge => b.sle(a),
            IntPredicate::Slt => a.slt(b),
            IntPredicate::Sle => a.sle(b),
        }
    }
}

/// Floating-point comparison predicates.
///
/// `O*` predicates are false when either operand is NaN, `U*` predicates are true.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

/// Conversion operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    Bitcast,
    PtrToInt,
    IntToPtr,
}

/// An operation with its operands.
#[derive(Clone, PartialEq, Debug)]
pub enum Op {
    // ========================================================================
    // Arithmetic and comparison
    // ========================================================================
    /// `result = left op right`
    Binary {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    /// `result = icmp predicate left, right` (`i1`)
    ICmp {
        predicate: IntPredicate,
        left: Operand,
        right: Operand,
    },
    /// `result = fcmp predicate left, right` (`i1`)
    FCmp {
        predicate: FloatPredicate,
        left: Operand,
        right: Operand,
    },
    /// `result = op value to <result type>`
    Cast { op: CastOp, value: Operand },

    // ========================================================================
    // Memory
    // ========================================================================
    /// `result = alloca ty`; the result is a pointer to a fresh block.
    Alloca { ty: IrType },
    /// `result = load pointer`
    Load { pointer: Operand },
    /// `store value, pointer`
    Store { value: Operand, pointer: Operand },
    /// `result = getelementptr base, indices...`
    ///
    /// A single index moves the pointer by whole elements; a second index selects an
    /// element of the pointed-to array.
    GetElementPtr { base: Operand, indices: Vec<Operand> },

    // ========================================================================
    // Data flow
    // ========================================================================
    /// `result = select condition, if_true, if_false`
    Select {
        condition: Operand,
        if_true: Operand,
        if_false: Operand,
    },
    /// `result = phi [value, block]...`
    Phi { incoming: Vec<(Operand, BlockId)> },
    /// `result = call callee(args...)`
    Call {
        callee: FunctionId,
        args: Vec<Operand>,
    },

    // ========================================================================
    // Terminators
    // ========================================================================
    /// `ret value?`
    Ret { value: Option<Operand> },
    /// `br target`
    Br { target: BlockId },
    /// `br condition, if_true, if_false`
    CondBr {
        condition: Operand,
        if_true: BlockId,
        if_false: BlockId,
    },
    /// `unreachable`
    Unreachable,
}

impl Op {
    /// Returns `true` if the operation ends a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Ret { .. } | Op::Br { .. } | Op::CondBr { .. } | Op::Unreachable
        )
    }

    /// Blocks control may continue in after this operation.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Br { target } => vec![*target],
            Op::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            _ => Vec::new(),
        }
    }

    /// Every operand, in textual order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::Binary { left, right, .. }
            | Op::ICmp { left, right, .. }
            | Op::FCmp { left, right, .. } => vec![left, right],
            Op::Cast { value, .. } => vec![value],
            Op::Load { pointer } => vec![pointer],
            Op::Store { value, pointer } => vec![value, pointer],
            Op::GetElementPtr { base, indices } => {
                std::iter::once(base).chain(indices.iter()).collect()
            }
            Op::Select {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            Op::Phi { incoming } => incoming.iter().map(|(value, _)| value).collect(),
            Op::Call { args, .. } => args.iter().collect(),
            Op::Ret { value } => value.iter().collect(),
            Op::CondBr { condition, .. } => vec![condition],
            Op::Alloca { .. } | Op::Br { .. } | Op::Unreachable => Vec::new(),
        }
    }
}

/// A typed operation.
#[derive(Clone, PartialEq, Debug)]
pub struct Instruction {
    /// What the instruction does.
    pub op: Op,
    /// Type of the result; `Void` when nothing is produced.
    pub ty: IrType,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub fn new(op: Op, ty: IrType) -> Self {
        Self { op, ty }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |operands: &[&Operand]| {
            operands
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &self.op {
            Op::Binary { op, left, right } => write!(f, "{op} {} {left}, {right}", self.ty),
            Op::ICmp {
                predicate,
                left,
                right,
            } => write!(f, "icmp {predicate} {left}, {right}"),
            Op::FCmp {
                predicate,
                left,
                right,
            } => write!(f, "fcmp {predicate} {left}, {right}"),
            Op::Cast { op, value } => write!(f, "{op} {value} to {}", self.ty),
            Op::Alloca { ty } => write!(f, "alloca {ty}"),
            Op::Load { pointer } => write!(f, "load {} {pointer}", self.ty),
            Op::Store { value, pointer } => write!(f, "store {value}, {pointer}"),
            Op::GetElementPtr { base, indices } => {
                let indices: Vec<&Operand> = indices.iter().collect();
                write!(f, "getelementptr {base}, {}", join(&indices))
            }
            Op::Select {
                condition,
                if_true,
                if_false,
            } => write!(f, "select {condition}, {if_true}, {if_false}"),
            Op::Phi { incoming } => {
                let incoming = incoming
                    .iter()
                    .map(|(value, block)| format!("[{value}, {block}]"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "phi {} {incoming}", self.ty)
            }
            Op::Call { callee, args } => {
                let args: Vec<&Operand> = args.iter().collect();
                write!(f, "call {} {callee}({})", self.ty, join(&args))
            }
            Op::Ret { value: Some(value) } => write!(f, "ret {value}"),
            Op::Ret { value: None } => write!(f, "ret void"),
            Op::Br { target } => write!(f, "br {target}"),
            Op::CondBr {
                condition,
                if_true,
                if_false,
            } => write!(f, "br {condition}, {if_true}, {if_false}"),
            Op::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_predicate_swap_is_consistent() {
        let a = ApInt::new(8, 0x80);
        let b = ApInt::new(8, 1);
        for predicate in IntPredicate::iter() {
            assert_eq!(
                predicate.evaluate(&a, &b),
                predicate.swapped().evaluate(&b, &a),
                "{predicate}"
            );
        }
        assert!(IntPredicate::Ugt.evaluate(&a, &b));
        assert!(IntPredicate::Slt.evaluate(&a, &b));
    }

    #[test]
    fn test_names() {
        assert_eq!(BinaryOp::UDiv.to_string(), "udiv");
        assert_eq!(CastOp::PtrToInt.to_string(), "ptrtoint");
        assert_eq!(FloatPredicate::Oeq.to_string(), "oeq");
        assert_eq!(BinaryOp::iter().filter(|op| op.is_float()).count(), 5);
        assert_eq!(IntPredicate::COUNT, 10);
    }

    #[test]
    fn test_terminators() {
        let br = Op::CondBr {
            condition: Operand::int(1, 1),
            if_true: BlockId::new(1),
            if_false: BlockId::new(2),
        };
        assert!(br.is_terminator());
        assert_eq!(br.successors(), vec![BlockId::new(1), BlockId::new(2)]);
        assert!(!Op::Alloca {
            ty: IrType::Integer(8)
        }
        .is_terminator());
    }

    #[test]
    fn test_display() {
        let add = Instruction::new(
            Op::Binary {
                op: BinaryOp::Add,
                left: Operand::int(32, 1),
                right: Operand::int(32, 2),
            },
            IrType::Integer(32),
        );
        assert_eq!(add.to_string(), "add i32 i32 1, i32 2");
        assert_eq!(
            Instruction::new(Op::Ret { value: None }, IrType::Void).to_string(),
            "ret void"
        );
    }
}
