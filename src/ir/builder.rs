//! Fluent construction of [`Module`]s.
//!
//! Front-ends and tests build programs through [`ModuleBuilder`]: functions and globals
//! are declared first so bodies can refer to any of them, then each defined function gets
//! its body through [`ModuleBuilder::define`]. [`ModuleBuilder::build`] validates the result.
//!
//! # Examples
//!
//! ```rust
//! use irscope::ir::{IntPredicate, IrType, ModuleBuilder, Operand};
//!
//! let mut builder = ModuleBuilder::new("demo");
//! let abs = builder.declare_function("abs", vec![IrType::Integer(32)], IrType::Integer(32));
//! builder.define(abs, |f| {
//!     let x = f.arg(0);
//!     let negative = f.icmp(IntPredicate::Slt, x.clone(), Operand::int(32, 0));
//!     let negated = f.sub(Operand::int(32, 0), x.clone());
//!     let result = f.select(negative, negated, x);
//!     f.ret(Some(result));
//! })?;
//! let module = builder.build()?;
//! assert_eq!(module.functions.len(), 1);
//! # Ok::<(), irscope::Error>(())
//! ```

use crate::{
    ir::{
        BinaryOp, Block, BlockId, CastOp, Constant, FloatPredicate, Function, FunctionId,
        FunctionKind, Global, GlobalId, InstrRef, Instruction, IntPredicate, IrType, Module, Op,
        Operand, Place,
    },
    Error, Result,
};

/// Builds a [`Module`].
#[derive(Debug)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Starts an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module {
                name: name.into(),
                ..Module::default()
            },
        }
    }

    /// Adds a global variable.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: IrType,
        initializer: Option<Constant>,
    ) -> GlobalId {
        self.module.globals.push(Global {
            name: name.into(),
            ty,
            initializer,
        });
        GlobalId::new(self.module.globals.len() - 1)
    }

    fn add_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret: IrType,
        kind: FunctionKind,
    ) -> FunctionId {
        self.module.functions.push(Function {
            name: name.into(),
            params,
            ret,
            kind,
            blocks: Vec::new(),
        });
        FunctionId::new(self.module.functions.len() - 1)
    }

    /// Declares a function whose body is supplied later through [`ModuleBuilder::define`].
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret: IrType,
    ) -> FunctionId {
        self.add_function(name, params, ret, FunctionKind::Defined)
    }

    /// Declares an external function without a body.
    pub fn declare_external(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret: IrType,
    ) -> FunctionId {
        self.add_function(name, params, ret, FunctionKind::Declaration)
    }

    /// Declares an intrinsic.
    pub fn declare_intrinsic(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret: IrType,
    ) -> FunctionId {
        self.add_function(name, params, ret, FunctionKind::Intrinsic)
    }

    /// Supplies the body of a declared function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FunctionNotFound`] if `id` was not declared by this builder and
    /// [`Error::Malformed`] if the body could not be typed (for example a `load` through a
    /// non-pointer).
    pub fn define<F>(&mut self, id: FunctionId, body: F) -> Result<()>
    where
        F: FnOnce(&mut FunctionBuilder),
    {
        let Some(function) = self.module.functions.get(id.index()) else {
            return Err(Error::FunctionNotFound(id.to_string()));
        };
        let mut builder = FunctionBuilder {
            id,
            params: function.params.clone(),
            globals: self.module.globals.iter().map(|g| g.ty.clone()).collect(),
            signatures: self
                .module
                .functions
                .iter()
                .map(|f| f.ret.clone())
                .collect(),
            blocks: vec![Block::default()],
            current: BlockId::new(0),
            error: None,
        };
        body(&mut builder);
        if let Some(error) = builder.error {
            return Err(error);
        }
        if let Some(function) = self.module.functions.get_mut(id.index()) {
            function.blocks = builder.blocks;
        }
        Ok(())
    }

    /// Validates and returns the module.
    ///
    /// # Errors
    ///
    /// Any error of [`Module::validate`].
    pub fn build(self) -> Result<Module> {
        self.module.validate()?;
        Ok(self.module)
    }
}

/// Builds the body of one function.
///
/// Instructions are appended to the current block, which starts as the entry block.
/// Value-producing methods return the result as an [`Operand`].
#[derive(Debug)]
pub struct FunctionBuilder {
    id: FunctionId,
    params: Vec<IrType>,
    globals: Vec<IrType>,
    signatures: Vec<IrType>,
    blocks: Vec<Block>,
    current: BlockId,
    error: Option<Error>,
}

impl FunctionBuilder {
    /// The function being built.
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// The block instructions are appended to.
    #[must_use]
    pub fn current(&self) -> BlockId {
        self.current
    }

    /// Adds an empty block without moving to it.
    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        BlockId::new(self.blocks.len() - 1)
    }

    /// Appends further instructions to `block`.
    pub fn position(&mut self, block: BlockId) {
        self.current = block;
    }

    /// The `index`-th parameter.
    #[must_use]
    pub fn arg(&self, index: usize) -> Operand {
        Operand::Place(Place::Argument {
            function: self.id,
            index,
        })
    }

    /// The address of a global.
    #[must_use]
    pub fn global(&self, global: GlobalId) -> Operand {
        Operand::Place(Place::Global(global))
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(malformed_error!(message));
        }
    }

    fn type_of(&self, operand: &Operand) -> Option<IrType> {
        match operand {
            Operand::Constant(Constant::Int(value)) => Some(IrType::Integer(value.width())),
            Operand::Constant(Constant::Float(_)) => Some(IrType::Float),
            Operand::Constant(Constant::Null) => Some(IrType::pointer_to(IrType::Integer(8))),
            Operand::Constant(Constant::Undef(ty)) => Some(ty.clone()),
            Operand::Place(Place::Argument { index, .. }) => self.params.get(*index).cloned(),
            Operand::Place(Place::Instruction(instr)) => self
                .blocks
                .get(instr.block.index())?
                .instructions
                .get(instr.index)
                .map(|i| i.ty.clone()),
            Operand::Place(Place::Global(global)) => self
                .globals
                .get(global.index())
                .map(|ty| IrType::pointer_to(ty.clone())),
        }
    }

    fn typed(&mut self, operand: &Operand) -> IrType {
        match self.type_of(operand) {
            Some(ty) => ty,
            None => {
                self.fail(format!("cannot type operand {operand}"));
                IrType::Void
            }
        }
    }

    /// Appends an instruction and returns its place.
    pub fn push(&mut self, op: Op, ty: IrType) -> Place {
        let Some(block) = self.blocks.get_mut(self.current.index()) else {
            self.fail(format!("positioned at missing block {}", self.current));
            return Place::Instruction(InstrRef::new(self.id, self.current, 0));
        };
        block.instructions.push(Instruction::new(op, ty));
        Place::Instruction(InstrRef::new(
            self.id,
            self.current,
            block.instructions.len() - 1,
        ))
    }

    fn value(&mut self, op: Op, ty: IrType) -> Operand {
        Operand::Place(self.push(op, ty))
    }

    /// `left op right`, typed after `left`.
    pub fn binary(&mut self, op: BinaryOp, left: Operand, right: Operand) -> Operand {
        let ty = self.typed(&left);
        self.value(Op::Binary { op, left, right }, ty)
    }

    /// Integer addition.
    pub fn add(&mut self, left: Operand, right: Operand) -> Operand {
        self.binary(BinaryOp::Add, left, right)
    }

    /// Integer subtraction.
    pub fn sub(&mut self, left: Operand, right: Operand) -> Operand {
        self.binary(BinaryOp::Sub, left, right)
    }

    /// Integer multiplication.
    pub fn mul(&mut self, left: Operand, right: Operand) -> Operand {
        self.binary(BinaryOp::Mul, left, right)
    }

    /// Integer or pointer comparison.
    pub fn icmp(&mut self, predicate: IntPredicate, left: Operand, right: Operand) -> Operand {
        self.value(
            Op::ICmp {
                predicate,
                left,
                right,
            },
            IrType::bool(),
        )
    }

    /// Float comparison.
    pub fn fcmp(&mut self, predicate: FloatPredicate, left: Operand, right: Operand) -> Operand {
        self.value(
            Op::FCmp {
                predicate,
                left,
                right,
            },
            IrType::bool(),
        )
    }

    /// Conversion of `value` to `ty`.
    pub fn cast(&mut self, op: CastOp, value: Operand, ty: IrType) -> Operand {
        self.value(Op::Cast { op, value }, ty)
    }

    /// Allocates a block holding a `ty` and returns a pointer to it.
    pub fn alloca(&mut self, ty: IrType) -> Operand {
        let pointer = IrType::pointer_to(ty.clone());
        self.value(Op::Alloca { ty }, pointer)
    }

    /// Reads through `pointer`.
    pub fn load(&mut self, pointer: Operand) -> Operand {
        let ty = match self.typed(&pointer) {
            IrType::Pointer(element) => *element,
            other => {
                self.fail(format!("load through non-pointer {pointer} of type {other}"));
                IrType::Void
            }
        };
        self.value(Op::Load { pointer }, ty)
    }

    /// Writes `value` through `pointer`.
    pub fn store(&mut self, value: Operand, pointer: Operand) {
        self.push(Op::Store { value, pointer }, IrType::Void);
    }

    /// Pointer arithmetic.
    ///
    /// With one index the result has the type of `base`; with two, `base` must point to an
    /// array and the result points to its element.
    pub fn gep(&mut self, base: Operand, indices: Vec<Operand>) -> Operand {
        let base_ty = self.typed(&base);
        let ty = match (indices.len(), &base_ty) {
            (1, IrType::Pointer(_)) => base_ty.clone(),
            (2, IrType::Pointer(pointee)) => match pointee.as_ref() {
                IrType::Array { element, .. } => IrType::pointer_to(element.as_ref().clone()),
                _ => {
                    self.fail(format!("getelementptr selects into non-array {base_ty}"));
                    IrType::Void
                }
            },
            _ => {
                self.fail(format!(
                    "unsupported getelementptr with {} indices on {base_ty}",
                    indices.len()
                ));
                IrType::Void
            }
        };
        self.value(Op::GetElementPtr { base, indices }, ty)
    }

    /// `condition ? if_true : if_false`.
    pub fn select(&mut self, condition: Operand, if_true: Operand, if_false: Operand) -> Operand {
        let ty = self.typed(&if_true);
        self.value(
            Op::Select {
                condition,
                if_true,
                if_false,
            },
            ty,
        )
    }

    /// A phi node; incoming edges may be added later with [`FunctionBuilder::add_incoming`].
    pub fn phi(&mut self, ty: IrType, incoming: Vec<(Operand, BlockId)>) -> Operand {
        self.value(Op::Phi { incoming }, ty)
    }

    /// Adds an incoming edge to a phi created earlier.
    pub fn add_incoming(&mut self, phi: &Operand, value: Operand, block: BlockId) {
        let Operand::Place(Place::Instruction(instr)) = phi else {
            self.fail(format!("{phi} is not a phi"));
            return;
        };
        let node = self
            .blocks
            .get_mut(instr.block.index())
            .and_then(|b| b.instructions.get_mut(instr.index));
        match node {
            Some(Instruction {
                op: Op::Phi { incoming },
                ..
            }) => incoming.push((value, block)),
            _ => self.fail(format!("{phi} is not a phi")),
        }
    }

    /// Calls `callee`; the result has the callee's return type.
    pub fn call(&mut self, callee: FunctionId, args: Vec<Operand>) -> Operand {
        let ty = match self.signatures.get(callee.index()) {
            Some(ret) => ret.clone(),
            None => {
                self.fail(format!("call to missing {callee}"));
                IrType::Void
            }
        };
        self.value(Op::Call { callee, args }, ty)
    }

    /// Returns from the function.
    pub fn ret(&mut self, value: Option<Operand>) {
        self.push(Op::Ret { value }, IrType::Void);
    }

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockId) {
        self.push(Op::Br { target }, IrType::Void);
    }

    /// Conditional branch.
    pub fn cond_br(&mut self, condition: Operand, if_true: BlockId, if_false: BlockId) {
        self.push(
            Op::CondBr {
                condition,
                if_true,
                if_false,
            },
            IrType::Void,
        );
    }

    /// Marks the rest of the block unreachable.
    pub fn unreachable(&mut self) {
        self.push(Op::Unreachable, IrType::Void);
    }
}
