// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # irscope
//!
//! An abstract interpreter for a typed, SSA-style intermediate representation. `irscope`
//! computes a sound over-approximation of every value a program may produce, at every
//! program point, without running it.
//!
//! ## Features
//!
//! - **Reduced-product integers** - known bits, small value sets and intervals combined in
//!   one [`domain::Container`]
//! - **Floating-point intervals** - [`domain::FloatRange`] with NaN tracking
//! - **Points-to analysis** - inclusion-based pointers into function and global memory
//! - **Aggregates** - exact per-element arrays with a summarized fallback for large arrays
//! - **Interprocedural** - call-site inputs flow into callees, callee outputs flow back,
//!   driven by a worklist to a whole-module fixed point
//!
//! ## Architecture
//!
//! - [`domain`] - the abstract domains and their lattice operations
//! - [`ir`] - the program representation and its builder
//! - [`interpreter`] - abstract states, transfer functions and the fixed-point driver
//!
//! ## Quick Start
//!
//! ```rust
//! use irscope::prelude::*;
//!
//! // max(x, 10) over an unknown x
//! let mut builder = ModuleBuilder::new("quick");
//! let max = builder.declare_function("max10", vec![IrType::Integer(32)], IrType::Integer(32));
//! builder.define(max, |b| {
//!     let x = b.arg(0);
//!     let small = b.icmp(IntPredicate::Slt, x.clone(), Operand::int(32, 10));
//!     let result = b.select(small, Operand::int(32, 10), x);
//!     b.ret(Some(result));
//! })?;
//! let module = builder.build()?;
//!
//! let mut interpreter = Interpreter::new(&module, InterpreterConfig::default())?;
//! interpreter.run();
//! let output = interpreter.function(max).unwrap().output_state();
//! println!("{output}");
//! # Ok::<(), irscope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Construction and validation of modules return [`Result`]. Internal consistency faults
//! of the domains are not errors: they abort the run with a panic naming the violated
//! invariant.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger itself.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub(crate) mod utils;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use irscope::prelude::*;
///
/// let value = Container::from_constant(&ApInt::new(8, 3));
/// assert!(value.single_value().is_some());
/// ```
pub mod prelude;

/// Abstract domains.
///
/// Every domain is a lattice implementing [`domain::Domain`]. Numeric domains additionally
/// expose their precision through [`domain::AccuracyValue`].
pub mod domain;

/// Program representation: modules, functions, blocks and instructions.
pub mod ir;

/// Abstract states, transfer functions and the fixed-point interpreter.
pub mod interpreter;

/// `irscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `irscope` Error type
///
/// # Examples
///
/// ```rust
/// use irscope::{interpreter::{Interpreter, InterpreterConfig}, ir::ModuleBuilder, Error};
///
/// let module = ModuleBuilder::new("empty").build()?;
/// match Interpreter::new(&module, InterpreterConfig::new().with_entry("main")) {
///     Err(Error::FunctionNotFound(name)) => assert_eq!(name, "main"),
///     _ => unreachable!(),
/// }
/// # Ok::<(), irscope::Error>(())
/// ```
pub use error::Error;
