//! # irscope Prelude
//!
//! The most commonly used types and traits of the library. Import this module to build a
//! module, run the interpreter and inspect its results without naming every submodule.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all irscope operations
pub use crate::Error;

/// The result type used throughout irscope
pub use crate::Result;

// ================================================================================================
// Program Representation
// ================================================================================================

/// Modules and their construction
pub use crate::ir::{Function, FunctionBuilder, FunctionKind, Global, Module, ModuleBuilder};

/// Instructions and operands
pub use crate::ir::{
    BinaryOp, CastOp, Constant, FloatPredicate, Instruction, IntPredicate, IrType, Op, Operand,
};

/// Program locations
pub use crate::ir::{BlockId, FunctionId, GlobalId, InstrRef, Place};

// ================================================================================================
// Abstract Domains
// ================================================================================================

/// Lattice traits
pub use crate::domain::{AccuracyValue, Domain};

/// Numeric domains
pub use crate::domain::{ApInt, Bits, Container, Enumeration, FloatRange, Range};

/// Memory domains and the value union
pub use crate::domain::{Array, InclusionBased, Target, Value};

// ================================================================================================
// Interpreter
// ================================================================================================

/// The fixed-point driver and its configuration
pub use crate::interpreter::{Interpreter, InterpreterConfig, RunSummary};

/// Per-function and per-block results
pub use crate::interpreter::{BlockInterp, FunctionInterp, State};

/// Interprocedural hook
pub use crate::interpreter::OperationsCallback;
