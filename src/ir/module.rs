//! The analysed program and its structural checks.

use crate::{
    ir::{
        Block, BlockId, Constant, Function, FunctionId, FunctionKind, GlobalId, Instruction,
        IrType, Op, Operand, Place,
    },
    Error, Result,
};

/// A module-level variable.
#[derive(Clone, PartialEq, Debug)]
pub struct Global {
    /// Symbol name.
    pub name: String,
    /// Type of the stored value.
    pub ty: IrType,
    /// Initial contents; unknown when `None`.
    pub initializer: Option<Constant>,
}

/// A whole program: functions and globals.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Functions, indexed by [`FunctionId`].
    pub functions: Vec<Function>,
    /// Globals, indexed by [`GlobalId`].
    pub globals: Vec<Global>,
}

impl Module {
    /// The function with the given id.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .map(FunctionId::new)
    }

    /// The global with the given id.
    #[must_use]
    pub fn global(&self, id: GlobalId) -> Option<&Global> {
        self.globals.get(id.index())
    }

    /// Looks up a global by name.
    #[must_use]
    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|global| global.name == name)
            .map(GlobalId::new)
    }

    /// The instruction at `place`, if it names one.
    #[must_use]
    pub fn instruction(&self, place: Place) -> Option<&Instruction> {
        let Place::Instruction(instr) = place else {
            return None;
        };
        self.function(instr.function)?
            .block(instr.block)?
            .instructions
            .get(instr.index)
    }

    /// Type of the value an operand naming `place` evaluates to.
    ///
    /// A global evaluates to its address.
    #[must_use]
    pub fn type_of(&self, place: Place) -> Option<IrType> {
        match place {
            Place::Argument { function, index } => {
                self.function(function)?.params.get(index).cloned()
            }
            Place::Instruction(_) => self.instruction(place).map(|i| i.ty.clone()),
            Place::Global(global) => Some(IrType::pointer_to(self.global(global)?.ty.clone())),
        }
    }

    /// Ids of the defined functions `caller` calls, without duplicates.
    #[must_use]
    pub fn callees(&self, caller: FunctionId) -> Vec<FunctionId> {
        let mut result = Vec::new();
        let Some(function) = self.function(caller) else {
            return result;
        };
        for instruction in function.blocks.iter().flat_map(|b| &b.instructions) {
            if let Op::Call { callee, .. } = instruction.op {
                if !result.contains(&callee) {
                    result.push(callee);
                }
            }
        }
        result
    }

    /// Checks the structural contract the interpreter relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWidth`] for integer types outside of `1..=64` bits,
    /// [`Error::UnsupportedType`] for values of type `void`, and [`Error::Malformed`] for
    /// missing terminators, dangling block, function or place references, and call arity
    /// mismatches.
    pub fn validate(&self) -> Result<()> {
        for global in &self.globals {
            check_type(&global.ty)?;
            if global.ty == IrType::Void {
                return Err(Error::UnsupportedType(format!("void global {}", global.name)));
            }
            if let Some(Constant::Int(value)) = &global.initializer {
                if global.ty.integer_width() != Some(value.width()) {
                    return Err(malformed_error!(
                        "initializer of {} does not match its type {}",
                        global.name,
                        global.ty
                    ));
                }
            }
        }

        for (index, function) in self.functions.iter().enumerate() {
            let id = FunctionId::new(index);
            for param in &function.params {
                check_type(param)?;
            }
            check_type(&function.ret)?;
            match function.kind {
                FunctionKind::Defined => {
                    if function.blocks.is_empty() {
                        return Err(malformed_error!("function {} has no blocks", function.name));
                    }
                    for (block_index, block) in function.blocks.iter().enumerate() {
                        self.validate_block(id, function, BlockId::new(block_index), block)?;
                    }
                }
                FunctionKind::Declaration | FunctionKind::Intrinsic => {
                    if !function.blocks.is_empty() {
                        return Err(malformed_error!(
                            "declaration {} has a body",
                            function.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_block(
        &self,
        id: FunctionId,
        function: &Function,
        block_id: BlockId,
        block: &Block,
    ) -> Result<()> {
        let name = &function.name;
        let count = block.instructions.len();
        if block.terminator().is_none() {
            return Err(malformed_error!("{name}:{block_id} does not end in a terminator"));
        }
        for (index, instruction) in block.instructions.iter().enumerate() {
            check_type(&instruction.ty)?;
            if instruction.op.is_terminator() && index + 1 != count {
                return Err(malformed_error!(
                    "{name}:{block_id}:%{index} terminator in the middle of a block"
                ));
            }
            for target in instruction.op.successors() {
                if function.block(target).is_none() {
                    return Err(malformed_error!("{name}:{block_id} branches to missing {target}"));
                }
            }
            for operand in instruction.op.operands() {
                self.validate_operand(id, operand)?;
            }
            match &instruction.op {
                Op::Phi { incoming } => {
                    if let Some((_, missing)) =
                        incoming.iter().find(|(_, b)| function.block(*b).is_none())
                    {
                        return Err(malformed_error!(
                            "{name}:{block_id}:%{index} phi names missing {missing}"
                        ));
                    }
                }
                Op::Call { callee, args } => {
                    let Some(target) = self.function(*callee) else {
                        return Err(malformed_error!(
                            "{name}:{block_id}:%{index} calls missing {callee}"
                        ));
                    };
                    if target.params.len() != args.len() {
                        return Err(malformed_error!(
                            "{name}:{block_id}:%{index} calls {} with {} arguments, expected {}",
                            target.name,
                            args.len(),
                            target.params.len()
                        ));
                    }
                }
                Op::Alloca { ty } => check_type(ty)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_operand(&self, id: FunctionId, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Place(place @ Place::Argument { function, index }) => {
                let valid = *function == id
                    && self
                        .function(id)
                        .is_some_and(|function| *index < function.params.len());
                if !valid {
                    return Err(malformed_error!("dangling argument {place}"));
                }
            }
            Operand::Place(place @ Place::Instruction(instr)) => {
                if instr.function != id || self.instruction(*place).is_none() {
                    return Err(malformed_error!("dangling instruction reference {place}"));
                }
            }
            Operand::Place(place @ Place::Global(global)) => {
                if self.global(*global).is_none() {
                    return Err(malformed_error!("dangling global {place}"));
                }
            }
            Operand::Constant(Constant::Undef(ty)) => check_type(ty)?,
            Operand::Constant(_) => {}
        }
        Ok(())
    }
}

fn check_type(ty: &IrType) -> Result<()> {
    match ty {
        IrType::Integer(width) if !ty.is_supported() => Err(Error::InvalidWidth(*width)),
        IrType::Pointer(element) | IrType::Array { element, .. } => check_type(element),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstrRef;

    fn function(blocks: Vec<Block>) -> Function {
        Function {
            name: "f".into(),
            params: vec![IrType::Integer(32)],
            ret: IrType::Void,
            kind: FunctionKind::Defined,
            blocks,
        }
    }

    fn block(ops: Vec<(Op, IrType)>) -> Block {
        Block {
            instructions: ops
                .into_iter()
                .map(|(op, ty)| Instruction::new(op, ty))
                .collect(),
        }
    }

    fn module(functions: Vec<Function>) -> Module {
        Module {
            name: "test".into(),
            functions,
            globals: vec![],
        }
    }

    #[test]
    fn test_valid_module() {
        let m = module(vec![function(vec![block(vec![(
            Op::Ret { value: None },
            IrType::Void,
        )])])]);
        assert!(m.validate().is_ok());
        assert_eq!(m.function_by_name("f"), Some(FunctionId::new(0)));
        assert_eq!(
            m.type_of(Place::Argument {
                function: FunctionId::new(0),
                index: 0
            }),
            Some(IrType::Integer(32))
        );
    }

    #[test]
    fn test_missing_terminator() {
        let m = module(vec![function(vec![block(vec![(
            Op::Alloca {
                ty: IrType::Integer(8),
            },
            IrType::pointer_to(IrType::Integer(8)),
        )])])]);
        assert!(matches!(m.validate(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_bad_branch_and_reference() {
        let m = module(vec![function(vec![block(vec![(
            Op::Br {
                target: BlockId::new(7),
            },
            IrType::Void,
        )])])]);
        assert!(matches!(m.validate(), Err(Error::Malformed { .. })));

        let dangling = Place::Instruction(InstrRef::new(FunctionId::new(0), BlockId::new(0), 5));
        let m = module(vec![function(vec![block(vec![(
            Op::Ret {
                value: Some(Operand::Place(dangling)),
            },
            IrType::Void,
        )])])]);
        assert!(matches!(m.validate(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_invalid_width() {
        let mut f = function(vec![block(vec![(Op::Ret { value: None }, IrType::Void)])]);
        f.params = vec![IrType::Integer(128)];
        assert!(matches!(
            module(vec![f]).validate(),
            Err(Error::InvalidWidth(128))
        ));
    }

    #[test]
    fn test_call_arity() {
        let call = Op::Call {
            callee: FunctionId::new(0),
            args: vec![],
        };
        let m = module(vec![function(vec![block(vec![
            (call, IrType::Void),
            (Op::Ret { value: None }, IrType::Void),
        ])])]);
        assert!(matches!(m.validate(), Err(Error::Malformed { .. })));
        assert_eq!(m.callees(FunctionId::new(0)), vec![FunctionId::new(0)]);
    }
}
