//! Read-only program representation consumed by the interpreter.
//!
//! A typed, SSA-like instruction set: a [`Module`] holds [`Function`]s and [`Global`]s, a
//! function holds [`Block`]s of [`Instruction`]s, and every instruction produces its result
//! at a [`Place`]. Places are small copyable handles, so abstract values can refer to
//! program locations without borrowing the module.
//!
//! Modules are populated by a front-end (or by tests) through [`ModuleBuilder`], which
//! validates the structural contract the interpreter relies on.

mod builder;
mod function;
mod instruction;
mod module;
mod place;
mod types;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use function::{Block, Function, FunctionKind};
pub use instruction::{
    BinaryOp, CastOp, Constant, FloatPredicate, Instruction, IntPredicate, Op, Operand,
};
pub use module::{Global, Module};
pub use place::{BlockId, FunctionId, GlobalId, InstrRef, Place};
pub use types::IrType;
