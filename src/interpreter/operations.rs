//! Transfer functions of the instruction set.
//!
//! [`Operations`] abstractly executes one instruction at a time against a [`State`],
//! binding the result at the instruction's place. Operands missing from the state are
//! bottom: the instruction is skipped and produces no binding, so unreached definitions
//! never leak top values into the rest of the function.
//!
//! Calls are delegated to an [`OperationsCallback`]; everything else is local.

use crate::{
    domain::{ApInt, Container, Domain, FloatRange, InclusionBased, Target, Value},
    interpreter::{constructors, OperationsCallback, State},
    ir::{
        BinaryOp, BlockId, CastOp, Constant, FunctionId, InstrRef, Instruction, IntPredicate,
        IrType, Module, Op, Operand, Place,
    },
};

/// Width of array offsets carried by pointers.
const OFFSET_WIDTH: u32 = 64;

/// Executes instructions of `module` against states.
pub(crate) struct Operations<'m, 'c> {
    module: &'m Module,
    callback: &'c mut dyn OperationsCallback,
}

impl<'m, 'c> Operations<'m, 'c> {
    pub(crate) fn new(module: &'m Module, callback: &'c mut dyn OperationsCallback) -> Self {
        Self { module, callback }
    }

    /// Executes every instruction of a block in order.
    pub(crate) fn execute_block(&mut self, function: FunctionId, block: BlockId, state: &mut State) {
        let Some(body) = self
            .module
            .function(function)
            .and_then(|function| function.block(block))
        else {
            return;
        };
        for (index, instruction) in body.instructions.iter().enumerate() {
            self.execute(InstrRef::new(function, block, index), instruction, state);
        }
    }

    /// Executes a single instruction, binding its result at `at`.
    pub(crate) fn execute(&mut self, at: InstrRef, instruction: &Instruction, state: &mut State) {
        let place = Place::Instruction(at);
        let ty = &instruction.ty;
        let result = match &instruction.op {
            Op::Binary { op, left, right } => self.binary(*op, left, right, ty, place, state),
            Op::ICmp {
                predicate,
                left,
                right,
            } => self.icmp(*predicate, left, right, place, state),
            Op::FCmp {
                predicate,
                left,
                right,
            } => {
                let left = evaluate(left, place, state);
                let right = evaluate(right, place, state);
                match (&left, &right) {
                    (Some(Value::Float(a)), Some(Value::Float(b))) => {
                        Some(Value::Integer(a.fcmp(*predicate, b)))
                    }
                    (Some(_), Some(_)) => Some(Value::Integer(Container::top(1))),
                    _ => None,
                }
            }
            Op::Cast { op, value } => self.cast(*op, value, ty, place, state),
            Op::Alloca { ty: allocated } => {
                if let Some(block) = constructors::create(allocated) {
                    state.add_block(place, &block);
                }
                let mut pointer = InclusionBased::new();
                pointer.add_memory_target(place, place, None);
                Some(pointer.into())
            }
            Op::Load { pointer } => self.load(pointer, ty, place, state),
            Op::Store { value, pointer } => {
                self.store(value, pointer, place, state);
                None
            }
            Op::GetElementPtr { base, indices } => self.gep(base, indices, place, state),
            Op::Select {
                condition,
                if_true,
                if_false,
            } => self.select(condition, if_true, if_false, place, state),
            Op::Phi { incoming } => incoming
                .iter()
                .filter_map(|(value, _)| evaluate(value, place, state))
                .reduce(|mut acc, value| {
                    acc.merge_or_havoc(&value);
                    acc
                }),
            Op::Call { callee, args } => {
                self.call(*callee, args, place, state);
                None
            }
            Op::Ret { value } => {
                if let Some(value) = value.as_ref().and_then(|value| evaluate(value, place, state)) {
                    state.set_returned(value);
                }
                None
            }
            Op::Br { .. } | Op::CondBr { .. } | Op::Unreachable => None,
        };

        if let Some(value) = result {
            state.bind(place, value);
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Operand,
        right: &Operand,
        ty: &IrType,
        place: Place,
        state: &State,
    ) -> Option<Value> {
        let left = evaluate(left, place, state)?;
        let right = evaluate(right, place, state)?;
        let result = match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) if !op.is_float() && a.width() == b.width() => {
                Value::Integer(a.binary(op, b))
            }
            (Value::Float(a), Value::Float(b)) if op.is_float() => Value::Float(match op {
                BinaryOp::FAdd => a.fadd(b),
                BinaryOp::FSub => a.fsub(b),
                BinaryOp::FMul => a.fmul(b),
                BinaryOp::FDiv => a.fdiv(b),
                _ => a.frem(b),
            }),
            _ => {
                log::trace!("{op} over {left} and {right} at {place}, assuming top");
                return constructors::create_top(ty, place);
            }
        };
        Some(result)
    }

    fn icmp(
        &self,
        predicate: IntPredicate,
        left: &Operand,
        right: &Operand,
        place: Place,
        state: &State,
    ) -> Option<Value> {
        let left = evaluate(left, place, state)?;
        let right = evaluate(right, place, state)?;
        let result = match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) if a.width() == b.width() => {
                a.icmp(predicate, b)
            }
            (Value::Pointer(a), Value::Pointer(b)) => Container::icmp_pointers(predicate, a, b),
            _ => Container::top(1),
        };
        Some(result.into())
    }

    fn cast(
        &self,
        op: CastOp,
        value: &Operand,
        ty: &IrType,
        place: Place,
        state: &State,
    ) -> Option<Value> {
        let value = evaluate(value, place, state)?;
        let width = ty.integer_width();
        let result = match (op, &value, width) {
            (CastOp::Trunc | CastOp::ZExt | CastOp::SExt, Value::Integer(integer), Some(width)) => {
                Value::Integer(constructors::resize(integer, width, op == CastOp::SExt))
            }
            (CastOp::FpToUi | CastOp::FpToSi, Value::Float(float), Some(width)) => {
                Value::Integer(float.to_integer(width, op == CastOp::FpToSi))
            }
            (CastOp::UiToFp | CastOp::SiToFp, Value::Integer(integer), _) => {
                Value::Float(FloatRange::from_integer(integer, op == CastOp::SiToFp))
            }
            (CastOp::PtrToInt, Value::Pointer(pointer), Some(width)) => {
                let addresses = pointer.targets().values().try_fold(
                    Container::bottom(width),
                    |mut acc, target| match target {
                        Target::Constant(address) => {
                            acc.merge(&constructors::resize(address, width, false));
                            Some(acc)
                        }
                        _ => None,
                    },
                );
                match addresses {
                    Some(addresses) if !pointer.is_empty() => Value::Integer(addresses),
                    _ => Value::Integer(Container::top(width)),
                }
            }
            (CastOp::IntToPtr, Value::Integer(integer), _) => Value::Pointer(
                InclusionBased::constant(place, constructors::resize(integer, OFFSET_WIDTH, false)),
            ),
            (CastOp::Bitcast, value, _) => match constructors::create(ty) {
                Some(expected) if expected.same_shape(value) => value.clone(),
                _ => return constructors::create_top(ty, place),
            },
            _ => return constructors::create_top(ty, place),
        };
        Some(result)
    }

    fn load(&self, pointer: &Operand, ty: &IrType, place: Place, state: &State) -> Option<Value> {
        let pointer = evaluate(pointer, place, state)?;
        let pointer = pointer.as_pointer()?;
        if pointer.is_empty() {
            return None;
        }
        let expected = constructors::create(ty)?;
        let unknown = pointer.targets().values().any(|target| match target {
            Target::Constant(address) => {
                address.single_value() != Some(ApInt::zero(address.width()))
            }
            _ => false,
        });
        match pointer.dereference(state) {
            Some(value) if !unknown && value.same_shape(&expected) => Some(value),
            _ => constructors::create_top(ty, place),
        }
    }

    fn store(&self, value: &Operand, pointer: &Operand, place: Place, state: &mut State) {
        let Some(value) = evaluate(value, place, state) else {
            return;
        };
        let Some(Value::Pointer(pointer)) = evaluate(pointer, place, state) else {
            return;
        };
        let strong = pointer.is_single_target();

        for target in pointer.targets().values() {
            let Target::Memory { location, offset } = target else {
                continue;
            };
            let Some(block) = state.find_block_mut(location) else {
                log::trace!("store at {place} through {location} to untracked memory");
                continue;
            };
            match (offset, &mut *block) {
                (None, block) => write(block, &value, strong),
                (Some(offset), Value::Array(array)) => array.set_item(offset, &value, strong),
                (Some(offset), block) => {
                    if offset.may_contain(&ApInt::zero(offset.width())) {
                        write(block, &value, strong);
                    }
                }
            }
        }
    }

    /// Address arithmetic.
    ///
    /// A single index moves the pointer by that many elements. Two indices step over whole
    /// arrays of the base type and then select an element: `gep p, i, j` addresses element
    /// `i * length + j` of the block `p` points to. Offsets that cannot be expressed in the
    /// block's element index become top.
    fn gep(
        &self,
        base_operand: &Operand,
        indices: &[Operand],
        place: Place,
        state: &State,
    ) -> Option<Value> {
        let base = evaluate(base_operand, place, state)?;
        let base = base.as_pointer()?;
        let mut offsets = Vec::with_capacity(indices.len());
        for index in indices {
            let index = evaluate(index, place, state)?;
            match index.as_integer() {
                Some(index) => offsets.push(constructors::resize(index, OFFSET_WIDTH, true)),
                None => return Some(Value::Pointer(base.clone())),
            }
        }

        let pointer = match offsets.as_slice() {
            [index] => {
                let zero = ApInt::zero(OFFSET_WIDTH);
                base.map_offsets(|offset| match offset {
                    Some(offset) => Some(offset.add(index)),
                    None if index.single_value() == Some(zero.clone()) => None,
                    None => Some(index.clone()),
                })
            }
            [first, element] => {
                let selected = if first.single_value() == Some(ApInt::zero(OFFSET_WIDTH)) {
                    element.clone()
                } else {
                    match self.pointee_length(base_operand) {
                        Some(length) => first.mul(ApInt::new(OFFSET_WIDTH, length)).add(element),
                        None => Container::top(OFFSET_WIDTH),
                    }
                };
                base.map_offsets(|offset| match offset {
                    Some(offset) if offset.single_value() != Some(ApInt::zero(OFFSET_WIDTH)) => {
                        Some(Container::top(OFFSET_WIDTH))
                    }
                    _ => Some(selected.clone()),
                })
            }
            _ => base.map_offsets(|_| Some(Container::top(OFFSET_WIDTH))),
        };
        Some(Value::Pointer(pointer))
    }

    /// Length of the array a pointer operand points to.
    fn pointee_length(&self, pointer: &Operand) -> Option<u64> {
        let ty = match pointer {
            Operand::Place(place) => self.module.type_of(*place)?,
            Operand::Constant(Constant::Undef(ty)) => ty.clone(),
            Operand::Constant(_) => return None,
        };
        match ty.pointee()? {
            IrType::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    fn select(
        &self,
        condition: &Operand,
        if_true: &Operand,
        if_false: &Operand,
        place: Place,
        state: &State,
    ) -> Option<Value> {
        let condition = evaluate(condition, place, state)?;
        let known = condition
            .as_integer()
            .and_then(Container::single_value)
            .map(|value| !value.is_zero());
        match known {
            Some(true) => evaluate(if_true, place, state),
            Some(false) => evaluate(if_false, place, state),
            None => {
                let if_true = evaluate(if_true, place, state);
                let if_false = evaluate(if_false, place, state);
                match (if_true, if_false) {
                    (Some(mut a), Some(b)) => {
                        a.merge_or_havoc(&b);
                        Some(a)
                    }
                    (a, b) => a.or(b),
                }
            }
        }
    }

    fn call(&mut self, callee: FunctionId, args: &[Operand], place: Place, state: &mut State) {
        let mut call_state = State::new();
        for (index, arg) in args.iter().enumerate() {
            let Some(value) = evaluate(arg, place, state) else {
                log::trace!("call at {place} skipped, argument {index} not reached");
                return;
            };
            call_state.bind(
                Place::Argument {
                    function: callee,
                    index,
                },
                value,
            );
        }
        call_state.merge_global(state);
        call_state.merge_function_blocks(state);
        self.callback
            .on_function_call(callee, &call_state, state, place);
    }
}

/// Replaces or joins a whole memory block.
fn write(block: &mut Value, value: &Value, strong: bool) {
    if strong && block.same_shape(value) {
        *block = value.clone();
    } else {
        block.merge_or_havoc(value);
    }
}

/// The abstract value of an operand consumed at `place`.
///
/// A global operand is the address of the global.
fn evaluate(operand: &Operand, place: Place, state: &State) -> Option<Value> {
    match operand {
        Operand::Place(global @ Place::Global(_)) => {
            let mut pointer = InclusionBased::new();
            pointer.add_memory_target(*global, *global, None);
            Some(pointer.into())
        }
        Operand::Place(source) => state.variable(source).cloned(),
        Operand::Constant(constant) => constructors::constant(constant, place),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{AccuracyValue, Array},
        ir::ModuleBuilder,
    };

    /// Records calls instead of resolving them.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(FunctionId, State)>,
    }

    impl OperationsCallback for Recorder {
        fn on_function_call(
            &mut self,
            function: FunctionId,
            call_state: &State,
            result_state: &mut State,
            result_place: Place,
        ) {
            self.calls.push((function, call_state.clone()));
            result_state.bind(result_place, Container::top(32).into());
        }
    }

    fn run(module: &Module, function: FunctionId) -> (State, Recorder) {
        let mut recorder = Recorder::default();
        let mut state = State::new();
        let blocks = module.function(function).unwrap().blocks.len();
        let mut operations = Operations::new(module, &mut recorder);
        for index in 0..blocks {
            operations.execute_block(function, BlockId::new(index), &mut state);
        }
        (state, recorder)
    }

    fn int(state: &State, operand: &Operand) -> Container {
        state
            .variable(&operand.as_place().unwrap())
            .and_then(Value::as_integer)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_arithmetic_and_compare() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Integer(32));
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let sum = b.add(Operand::int(32, 40), Operand::int(32, 2));
                let cmp = b.icmp(IntPredicate::Eq, sum.clone(), Operand::int(32, 42));
                let wide = b.cast(CastOp::ZExt, cmp.clone(), IrType::Integer(8));
                b.ret(Some(sum.clone()));
                results.extend([sum, cmp, wide]);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        assert_eq!(int(&state, &results[0]).single_value(), Some(ApInt::new(32, 42)));
        assert_eq!(int(&state, &results[1]).single_value(), Some(ApInt::from_bool(true)));
        assert_eq!(int(&state, &results[2]).single_value(), Some(ApInt::new(8, 1)));
        assert!(state.returned().is_some());
    }

    #[test]
    fn test_missing_operand_skips() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![IrType::Integer(8)], IrType::Void);
        let mut sum = None;
        module
            .define(f, |b| {
                let arg = b.arg(0);
                sum = Some(b.add(arg, Operand::int(8, 1)));
                b.ret(None);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);
        let sum = sum.and_then(|sum| sum.as_place()).unwrap();
        assert!(state.variable(&sum).is_none());
    }

    #[test]
    fn test_store_load_array() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Integer(32));
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let array = b.alloca(IrType::array_of(4, IrType::Integer(32)));
                let first = b.gep(array, vec![Operand::int(32, 0), Operand::int(32, 1)]);
                b.store(Operand::int(32, 7), first.clone());
                let second = b.gep(first.clone(), vec![Operand::int(32, 1)]);
                b.store(Operand::int(32, 9), second.clone());
                let a = b.load(first);
                let c = b.load(second);
                b.ret(Some(a.clone()));
                results.extend([a, c]);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        assert_eq!(int(&state, &results[0]).single_value(), Some(ApInt::new(32, 7)));
        assert_eq!(int(&state, &results[1]).single_value(), Some(ApInt::new(32, 9)));
    }

    #[test]
    fn test_gep_steps_over_whole_arrays() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Void);
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let array = b.alloca(IrType::array_of(4, IrType::Integer(32)));
                let first = b.gep(array.clone(), vec![Operand::int(64, 0), Operand::int(64, 0)]);
                b.store(Operand::int(32, 7), first);
                let past = b.gep(array.clone(), vec![Operand::int(64, 1), Operand::int(64, 0)]);
                let unknown = b.gep(
                    array,
                    vec![
                        Operand::Constant(Constant::Undef(IrType::Integer(64))),
                        Operand::int(64, 0),
                    ],
                );
                results.extend([b.load(past), b.load(unknown)]);
                b.ret(None);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        let past = int(&state, &results[0]);
        assert!(past.is_top());
        assert!(int(&state, &results[1]).may_contain(&ApInt::new(32, 7)));
    }

    #[test]
    fn test_gep_with_other_index_counts_gives_top_offset() {
        let module = ModuleBuilder::new("m").build().unwrap();
        let mut recorder = Recorder::default();
        let mut operations = Operations::new(&module, &mut recorder);

        let at = |index| InstrRef::new(FunctionId::new(0), BlockId::new(0), index);
        let block = Place::Instruction(at(0));
        let base = Place::Instruction(at(1));
        let mut state = State::new();
        state.add_block(block, &Array::filled(4, Container::top(32).into()).into());
        let mut pointer = InclusionBased::new();
        pointer.add_memory_target(block, block, None);
        state.bind(base, pointer.into());

        let gep = Instruction::new(
            Op::GetElementPtr {
                base: Operand::Place(base),
                indices: vec![Operand::int(64, 0); 3],
            },
            IrType::pointer_to(IrType::Integer(32)),
        );
        operations.execute(at(2), &gep, &mut state);

        let result = state
            .variable(&Place::Instruction(at(2)))
            .and_then(Value::as_pointer)
            .unwrap();
        let Some(Target::Memory {
            offset: Some(offset),
            ..
        }) = result.targets().get(&block)
        else {
            panic!("expected a memory target with an offset");
        };
        assert!(offset.is_top());
    }

    #[test]
    fn test_load_through_unknown_address_is_top() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Void);
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let slot = b.alloca(IrType::Integer(32));
                b.store(Operand::int(32, 5), slot.clone());
                let unknown = Operand::Constant(Constant::Undef(IrType::pointer_to(
                    IrType::Integer(32),
                )));
                let either = b.select(
                    Operand::Constant(Constant::Undef(IrType::Integer(1))),
                    slot,
                    unknown.clone(),
                );
                results.extend([b.load(unknown), b.load(either)]);
                b.ret(None);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        assert!(int(&state, &results[0]).is_top());
        assert!(int(&state, &results[1]).is_top());
    }

    #[test]
    fn test_weak_update_through_two_targets() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Void);
        let mut loaded = None;
        module
            .define(f, |b| {
                let x = b.alloca(IrType::Integer(32));
                let y = b.alloca(IrType::Integer(32));
                b.store(Operand::int(32, 1), x.clone());
                b.store(Operand::int(32, 2), y.clone());
                let either = b.select(
                    Operand::Constant(Constant::Undef(IrType::Integer(1))),
                    x.clone(),
                    y,
                );
                b.store(Operand::int(32, 3), either);
                loaded = Some(b.load(x));
                b.ret(None);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        let value = int(&state, &loaded.unwrap());
        assert!(value.may_contain(&ApInt::new(32, 1)));
        assert!(value.may_contain(&ApInt::new(32, 3)));
        assert!(!value.may_contain(&ApInt::new(32, 2)));
    }

    #[test]
    fn test_pointer_compare_and_null() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Integer(1));
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let x = b.alloca(IrType::Integer(8));
                let is_null = b.icmp(IntPredicate::Eq, x.clone(), Operand::null());
                let same = b.icmp(IntPredicate::Eq, x.clone(), x);
                b.ret(Some(same.clone()));
                results.extend([is_null, same]);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        assert_eq!(int(&state, &results[0]).single_value(), Some(ApInt::from_bool(false)));
        assert_eq!(int(&state, &results[1]).single_value(), Some(ApInt::from_bool(true)));
    }

    #[test]
    fn test_call_passes_arguments_and_memory() {
        let mut module = ModuleBuilder::new("m");
        let callee = module.declare_function("g", vec![IrType::Integer(32)], IrType::Integer(32));
        let f = module.declare_function("f", vec![], IrType::Integer(32));
        module
            .define(callee, |b| {
                let arg = b.arg(0);
                b.ret(Some(arg));
            })
            .unwrap();
        let mut result = None;
        module
            .define(f, |b| {
                let slot = b.alloca(IrType::Integer(32));
                b.store(Operand::int(32, 5), slot);
                let value = b.call(callee, vec![Operand::int(32, 3)]);
                b.ret(Some(value.clone()));
                result = Some(value);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, recorder) = run(&module, f);

        let (function, call_state) = &recorder.calls[0];
        assert_eq!(*function, callee);
        let arg = call_state
            .variable(&Place::Argument {
                function: callee,
                index: 0,
            })
            .and_then(Value::as_integer)
            .unwrap();
        assert_eq!(arg.single_value(), Some(ApInt::new(32, 3)));
        assert_eq!(call_state.blocks().len(), 1);
        assert!(int(&state, &result.unwrap()).is_top());
    }

    #[test]
    fn test_float_ops() {
        let mut module = ModuleBuilder::new("m");
        let f = module.declare_function("f", vec![], IrType::Integer(32));
        let mut results = Vec::new();
        module
            .define(f, |b| {
                let sum = b.binary(BinaryOp::FAdd, Operand::float(1.5), Operand::float(2.0));
                let int = b.cast(CastOp::FpToSi, sum.clone(), IrType::Integer(32));
                b.ret(Some(int.clone()));
                results.extend([sum, int]);
            })
            .unwrap();
        let module = module.build().unwrap();
        let (state, _) = run(&module, f);

        let sum = state
            .variable(&results[0].as_place().unwrap())
            .and_then(Value::as_float)
            .unwrap();
        assert_eq!(sum.single_value(), Some(3.5));
        assert_eq!(int(&state, &results[1]).single_value(), Some(ApInt::new(32, 3)));
    }
}
