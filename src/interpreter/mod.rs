//! Interprocedural fixed-point interpreter.
//!
//! The [`Interpreter`] computes, for every defined function of a [`Module`], an abstract
//! [`State`] at the entry and exit of each block. Functions are processed from a
//! deduplicating worklist:
//!
//! 1. Seed the worklist with every defined function, roots first
//! 2. Pop a function and run passes over its blocks in reverse postorder until no block
//!    output changes (a *visit*)
//! 3. Enqueue every callee whose input grew through a call site of the visit
//! 4. If the function's output changed, enqueue its callers
//! 5. Stop when the worklist is empty or the visit budget is exhausted
//!
//! Block inputs accumulate across passes and visits. Once a function has seen
//! [`InterpreterConfig::widening_delay`] passes, block inputs are widened instead of
//! joined, so loops whose bounds are unknown still converge quickly.
//!
//! # Example
//!
//! ```rust
//! use irscope::prelude::*;
//!
//! let mut builder = ModuleBuilder::new("demo");
//! let main = builder.declare_function("main", vec![], IrType::Integer(32));
//! builder.define(main, |b| {
//!     let sum = b.add(Operand::int(32, 40), Operand::int(32, 2));
//!     b.ret(Some(sum));
//! })?;
//! let module = builder.build()?;
//!
//! let mut interpreter = Interpreter::new(&module, InterpreterConfig::default())?;
//! let summary = interpreter.run();
//! assert!(summary.converged);
//!
//! let output = interpreter.function(main).unwrap().output_state();
//! let returned = output.returned().and_then(Value::as_integer).unwrap();
//! assert_eq!(returned.single_value(), Some(ApInt::new(32, 42)));
//! # Ok::<(), irscope::Error>(())
//! ```

mod callback;
mod config;
pub mod constructors;
mod operations;
mod state;

use std::collections::{BTreeSet, VecDeque};

use crate::{
    domain::{Domain, Value},
    ir::{BlockId, FunctionId, GlobalId, Module, Place},
    Error, Result,
};

pub use callback::OperationsCallback;
pub use config::InterpreterConfig;
pub use state::State;

use callback::CallHandler;
use operations::Operations;

/// Abstract states at the boundaries of one block.
#[derive(Clone, Debug, Default)]
pub struct BlockInterp {
    input: State,
    output: State,
}

impl BlockInterp {
    /// The join of every state control may enter the block with.
    #[must_use]
    pub fn input_state(&self) -> &State {
        &self.input
    }

    /// The state after the last instruction of the block.
    #[must_use]
    pub fn output_state(&self) -> &State {
        &self.output
    }
}

/// Per-function analysis results.
#[derive(Clone, Debug, Default)]
pub struct FunctionInterp {
    pub(crate) input: State,
    pub(crate) output: State,
    blocks: Vec<BlockInterp>,
    passes: usize,
}

impl FunctionInterp {
    /// Arguments and memory the function may be entered with.
    #[must_use]
    pub fn input_state(&self) -> &State {
        &self.input
    }

    /// Globals, foreign memory and the returned value at the function's returns.
    #[must_use]
    pub fn output_state(&self) -> &State {
        &self.output
    }

    /// The states of block `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BlockInterp> {
        self.blocks.get(id.index())
    }

    /// Block passes performed over the function so far.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }
}

/// Statistics of a finished [`Interpreter::run`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RunSummary {
    /// Every function reached its fixed point within the configured budgets.
    pub converged: bool,
    /// Function visits performed.
    pub function_visits: usize,
    /// Block passes performed over all functions.
    pub block_passes: usize,
}

/// Worklist-driven abstract interpreter over a module.
pub struct Interpreter<'m> {
    module: &'m Module,
    config: InterpreterConfig,
    functions: Vec<FunctionInterp>,
    /// Callers of each function, from the static call graph.
    callers: Vec<Vec<FunctionId>>,
    worklist: VecDeque<FunctionId>,
    /// Whether each function is currently in the worklist (for deduplication).
    in_worklist: Vec<bool>,
    /// Unavailable callees already reported.
    reported: BTreeSet<FunctionId>,
    visits: usize,
    passes: usize,
    exhausted: bool,
    truncated: bool,
}

impl<'m> Interpreter<'m> {
    /// Prepares the analysis of `module`.
    ///
    /// Roots start with top arguments and the initial contents of every global. All other
    /// functions start with bottom arguments and receive their inputs from call sites.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is not well formed, or [`Error::FunctionNotFound`]
    /// if the configured entry does not name a defined function.
    pub fn new(module: &'m Module, config: InterpreterConfig) -> Result<Self> {
        module.validate()?;

        let count = module.functions.len();
        let mut callers: Vec<Vec<FunctionId>> = vec![Vec::new(); count];
        for caller in (0..count).map(FunctionId::new) {
            for callee in module.callees(caller) {
                if let Some(list) = callers.get_mut(callee.index()) {
                    if !list.contains(&caller) {
                        list.push(caller);
                    }
                }
            }
        }

        let defined: Vec<FunctionId> = module
            .functions
            .iter()
            .enumerate()
            .filter(|(_, function)| function.is_defined())
            .map(|(index, _)| FunctionId::new(index))
            .collect();

        let roots = match &config.entry {
            Some(name) => match module.function_by_name(name) {
                Some(id) if defined.contains(&id) => vec![id],
                _ => return Err(Error::FunctionNotFound(name.clone())),
            },
            None => {
                let uncalled: Vec<FunctionId> = defined
                    .iter()
                    .copied()
                    .filter(|id| callers[id.index()].iter().all(|caller| caller == id))
                    .collect();
                if uncalled.is_empty() {
                    defined.clone()
                } else {
                    uncalled
                }
            }
        };

        let mut functions: Vec<FunctionInterp> = module
            .functions
            .iter()
            .map(|function| FunctionInterp {
                blocks: vec![BlockInterp::default(); function.blocks.len()],
                ..FunctionInterp::default()
            })
            .collect();

        for &id in &defined {
            let root = roots.contains(&id);
            let Some(function) = module.function(id) else {
                continue;
            };
            let input = &mut functions[id.index()].input;
            for (index, ty) in function.params.iter().enumerate() {
                let place = Place::Argument {
                    function: id,
                    index,
                };
                let value = if root {
                    constructors::create_top(ty, place)
                } else {
                    constructors::create(ty)
                };
                if let Some(value) = value {
                    input.bind(place, value);
                }
            }
            if root {
                for (index, global) in module.globals.iter().enumerate() {
                    let place = Place::Global(GlobalId::new(index));
                    if let Some(value) = constructors::global(global, place) {
                        input.add_block(place, &value);
                    }
                }
            }
        }

        let mut interpreter = Self {
            module,
            config,
            functions,
            callers,
            worklist: VecDeque::new(),
            in_worklist: vec![false; count],
            reported: BTreeSet::new(),
            visits: 0,
            passes: 0,
            exhausted: false,
            truncated: false,
        };
        for &id in roots.iter().chain(defined.iter()) {
            interpreter.enqueue(id);
        }
        Ok(interpreter)
    }

    /// The analysed module.
    #[must_use]
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// The configuration of the run.
    #[must_use]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Results for function `id`.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&FunctionInterp> {
        self.functions.get(id.index())
    }

    /// Returns `true` while functions wait in the worklist and the budget allows visiting
    /// them.
    #[must_use]
    pub fn has_work(&self) -> bool {
        !self.exhausted && !self.worklist.is_empty()
    }

    /// Performs one function visit and reports whether work remains.
    pub fn step(&mut self) -> bool {
        if !self.has_work() {
            return false;
        }
        if self.visits >= self.config.max_function_visits {
            log::warn!(
                "visit budget of {} exhausted with {} functions pending",
                self.config.max_function_visits,
                self.worklist.len()
            );
            self.exhausted = true;
            return false;
        }
        if let Some(id) = self.worklist.pop_front() {
            self.in_worklist[id.index()] = false;
            self.visit(id);
            self.visits += 1;
        }
        self.has_work()
    }

    /// Steps until the worklist is empty or a budget is exhausted.
    pub fn run(&mut self) -> RunSummary {
        while self.step() {}
        let summary = RunSummary {
            converged: self.worklist.is_empty() && !self.truncated,
            function_visits: self.visits,
            block_passes: self.passes,
        };
        log::info!(
            "module {}: converged={} after {} function visits and {} block passes",
            self.module.name,
            summary.converged,
            summary.function_visits,
            summary.block_passes
        );
        summary
    }

    /// The abstract value of `place` in the states of its owning function.
    ///
    /// Arguments are read from the function input, instruction results from the output of
    /// their block, and globals are joined over the outputs of every function.
    #[must_use]
    pub fn find_variable(&self, place: &Place) -> Option<Value> {
        match place {
            Place::Argument { function, .. } => self
                .functions
                .get(function.index())?
                .input
                .variable(place)
                .cloned(),
            Place::Instruction(instr) => self
                .functions
                .get(instr.function.index())?
                .block(instr.block)?
                .output
                .find_variable(place)
                .cloned(),
            Place::Global(_) => self
                .functions
                .iter()
                .filter_map(|function| function.output.find_block(place))
                .fold(None, |acc: Option<Value>, value| {
                    Some(match acc {
                        Some(mut acc) => {
                            acc.merge(value);
                            acc
                        }
                        None => value.clone(),
                    })
                }),
        }
    }

    /// Rough estimate of the bytes held by every state.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.functions
            .iter()
            .map(|function| {
                function.input.memory_usage()
                    + function.output.memory_usage()
                    + function
                        .blocks
                        .iter()
                        .map(|block| block.input.memory_usage() + block.output.memory_usage())
                        .sum::<usize>()
            })
            .sum()
    }

    fn enqueue(&mut self, id: FunctionId) {
        let index = id.index();
        if index < self.in_worklist.len() && !self.in_worklist[index] {
            self.worklist.push_back(id);
            self.in_worklist[index] = true;
        }
    }

    /// Drives one function to its local fixed point.
    fn visit(&mut self, id: FunctionId) {
        let module = self.module;
        let Some(function) = module.function(id).filter(|function| function.is_defined()) else {
            return;
        };
        let index = id.index();
        let order = function.reverse_postorder();
        let predecessors = function.predecessors();
        let entry = BlockId::new(0);

        let mut blocks = std::mem::take(&mut self.functions[index].blocks);
        let input = self.functions[index].input.clone();
        let mut passes = self.functions[index].passes;
        let mut visit_passes = 0;
        let mut truncated = false;

        let mut handler = CallHandler {
            module,
            functions: &mut self.functions,
            reported: &mut self.reported,
            report_missing: self.config.report_missing,
            changed: Vec::new(),
        };

        loop {
            let widen = passes >= self.config.widening_delay;
            let mut changed = false;
            for &block in &order {
                let mut incoming = State::new();
                if block == entry {
                    incoming.merge(&input);
                }
                for predecessor in &predecessors[block.index()] {
                    incoming.merge(&blocks[predecessor.index()].output);
                }

                let interp = &mut blocks[block.index()];
                if widen {
                    interp.input.widen_from(&incoming);
                } else {
                    interp.input.merge(&incoming);
                }
                let mut output = interp.input.clone();
                Operations::new(module, &mut handler).execute_block(id, block, &mut output);
                if output != interp.output {
                    interp.output = output;
                    changed = true;
                }
            }
            passes += 1;
            visit_passes += 1;
            log::trace!("{}: pass {passes}, changed={changed}", function.name);

            if !changed {
                break;
            }
            if visit_passes >= self.config.max_block_passes {
                log::warn!(
                    "{}: no local fixed point after {visit_passes} passes",
                    function.name
                );
                truncated = true;
                break;
            }
        }
        let callees = std::mem::take(&mut handler.changed);

        let mut output = State::new();
        for block in function.return_blocks() {
            let state = &blocks[block.index()].output;
            output.merge_global(state);
            output.merge_foreign_function_blocks(state, id);
            output.merge_returned_value(state);
        }

        let interp = &mut self.functions[index];
        interp.blocks = blocks;
        interp.passes = passes;
        let output_changed = interp.output != output;
        if output_changed {
            interp.output = output;
        }
        self.passes += visit_passes;
        self.truncated |= truncated;
        log::debug!(
            "visited {} in {visit_passes} passes, output changed={output_changed}",
            function.name
        );

        for callee in callees {
            self.enqueue(callee);
        }
        if output_changed {
            for caller in self.callers[index].clone() {
                self.enqueue(caller);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{AccuracyValue, Container},
        ir::{IrType, ModuleBuilder},
    };

    fn caller_and_callee() -> (Module, FunctionId, FunctionId) {
        let mut builder = ModuleBuilder::new("roots");
        let callee =
            builder.declare_function("callee", vec![IrType::Integer(8)], IrType::Integer(8));
        let main = builder.declare_function("main", vec![IrType::Integer(8)], IrType::Integer(8));
        builder
            .define(callee, |b| {
                let x = b.arg(0);
                b.ret(Some(x));
            })
            .unwrap();
        builder
            .define(main, |b| {
                let x = b.arg(0);
                let y = b.call(callee, vec![x]);
                b.ret(Some(y));
            })
            .unwrap();
        (builder.build().unwrap(), main, callee)
    }

    fn argument(interpreter: &Interpreter<'_>, function: FunctionId) -> Container {
        interpreter
            .function(function)
            .and_then(|f| {
                f.input_state().variable(&Place::Argument {
                    function,
                    index: 0,
                })
            })
            .and_then(Value::as_integer)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_roots_start_with_top_arguments() {
        let (module, main, callee) = caller_and_callee();
        let interpreter = Interpreter::new(&module, InterpreterConfig::default()).unwrap();

        assert!(argument(&interpreter, main).is_top());
        assert!(argument(&interpreter, callee).is_bottom());
        assert_eq!(interpreter.worklist.front(), Some(&main));
        assert_eq!(interpreter.worklist.len(), 2);
    }

    #[test]
    fn test_entry_overrides_roots() {
        let (module, main, callee) = caller_and_callee();
        let interpreter =
            Interpreter::new(&module, InterpreterConfig::new().with_entry("callee")).unwrap();

        assert!(argument(&interpreter, callee).is_top());
        assert!(argument(&interpreter, main).is_bottom());
    }

    #[test]
    fn test_call_sites_feed_callee_input() {
        let (module, main, callee) = caller_and_callee();
        let mut interpreter = Interpreter::new(&module, InterpreterConfig::default()).unwrap();
        assert!(interpreter.run().converged);

        assert!(argument(&interpreter, callee).is_top());
        let result = interpreter
            .function(main)
            .and_then(|f| f.output_state().returned())
            .and_then(Value::as_integer)
            .unwrap();
        assert!(result.is_top());
        assert!(interpreter.function(callee).unwrap().passes() > 0);
    }

    #[test]
    fn test_enqueue_deduplicates() {
        let (module, main, _) = caller_and_callee();
        let mut interpreter = Interpreter::new(&module, InterpreterConfig::default()).unwrap();
        interpreter.enqueue(main);
        interpreter.enqueue(main);
        assert_eq!(interpreter.worklist.len(), 2);
    }
}
