use crate::{
    ir::{BlockId, Instruction, IrType, Op},
    utils::Successors,
};

/// How a function is available to the analysis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FunctionKind {
    /// The body is part of the module.
    Defined,
    /// External function without a body.
    Declaration,
    /// Compiler intrinsic without a body.
    Intrinsic,
}

/// A basic block: instructions in program order, the last one being the terminator.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Block {
    /// The instructions.
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// The terminating operation, if the block has one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Op> {
        self.instructions
            .last()
            .map(|instruction| &instruction.op)
            .filter(|op| op.is_terminator())
    }

    /// Successor blocks.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator().map(Op::successors).unwrap_or_default()
    }

    /// Returns `true` if the block ends in `ret`.
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self.terminator(), Some(Op::Ret { .. }))
    }
}

/// A function of the module.
#[derive(Clone, PartialEq, Debug)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    /// Parameter types.
    pub params: Vec<IrType>,
    /// Return type.
    pub ret: IrType,
    /// Availability of the body.
    pub kind: FunctionKind,
    /// Blocks; block 0 is the entry. Empty unless `kind` is `Defined`.
    pub blocks: Vec<Block>,
}

impl Function {
    /// Returns `true` if the body can be interpreted.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.kind == FunctionKind::Defined && !self.blocks.is_empty()
    }

    /// The block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// Predecessor lists, indexed by block.
    #[must_use]
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut result = vec![Vec::new(); self.blocks.len()];
        for (index, block) in self.blocks.iter().enumerate() {
            for succ in block.successors() {
                if let Some(preds) = result.get_mut(succ.index()) {
                    if !preds.contains(&BlockId::new(index)) {
                        preds.push(BlockId::new(index));
                    }
                }
            }
        }
        result
    }

    /// Blocks ending in `ret`.
    pub fn return_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.is_return())
            .map(|(index, _)| BlockId::new(index))
    }

    /// Reachable blocks in reverse postorder from the entry.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        crate::utils::reverse_postorder(self, 0)
            .into_iter()
            .map(BlockId::new)
            .collect()
    }
}

impl Successors for Function {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn successors(&self, node: usize) -> Vec<usize> {
        self.blocks
            .get(node)
            .map(|block| block.successors().into_iter().map(BlockId::index).collect())
            .unwrap_or_default()
    }
}
