//! Interprocedural hook invoked for every call instruction.

use std::collections::BTreeSet;

use crate::{
    interpreter::{constructors, FunctionInterp, State},
    ir::{FunctionId, Module, Place},
};

/// Handles `call` instructions on behalf of the transfer functions.
///
/// `call_state` holds the caller's global and function memory plus one argument binding per
/// parameter, keyed by [`Place::Argument`] of the callee. The implementation binds the call
/// result at `result_place` in `result_state` and merges whatever memory effects it knows
/// about into it.
pub trait OperationsCallback {
    /// Abstractly executes a call to `function`.
    fn on_function_call(
        &mut self,
        function: FunctionId,
        call_state: &State,
        result_state: &mut State,
        result_place: Place,
    );
}

/// The interpreter's call handling.
///
/// Defined callees receive the call state in their input and hand back their current
/// output. Callees without a body produce a top result.
pub(crate) struct CallHandler<'a> {
    pub(crate) module: &'a Module,
    pub(crate) functions: &'a mut [FunctionInterp],
    pub(crate) reported: &'a mut BTreeSet<FunctionId>,
    pub(crate) report_missing: bool,
    /// Callees whose input grew during the current visit.
    pub(crate) changed: Vec<FunctionId>,
}

impl OperationsCallback for CallHandler<'_> {
    fn on_function_call(
        &mut self,
        function: FunctionId,
        call_state: &State,
        result_state: &mut State,
        result_place: Place,
    ) {
        let Some(callee) = self.module.function(function) else {
            return;
        };

        let interp = match self.functions.get_mut(function.index()) {
            Some(interp) if callee.is_defined() => interp,
            _ => {
                if self.report_missing && self.reported.insert(function) {
                    log::warn!("function {} is not available, assuming top", callee.name);
                }
                if let Some(value) = constructors::create_top(&callee.ret, result_place) {
                    result_state.bind(result_place, value);
                }
                return;
            }
        };

        let before = interp.input.clone();
        interp.input.merge(call_state);
        if interp.input != before && !self.changed.contains(&function) {
            self.changed.push(function);
        }

        let output = &interp.output;
        result_state.merge_global(output);
        result_state.merge_function_blocks(output);
        if let Some(value) = output.returned() {
            result_state.bind(result_place, value.clone());
        }
    }
}
