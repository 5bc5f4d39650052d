//! Stable handles into a [`crate::ir::Module`].
//!
//! Handles are plain indices. Abstract values store them instead of references, so a pointer
//! target never borrows the program or the memory it names.

use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub struct $name(usize);

        impl $name {
            /// Creates a handle from its index.
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// The index the handle wraps.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle!(
    /// Index of a function in its module.
    FunctionId,
    "@f"
);
handle!(
    /// Index of a block in its function; block 0 is the entry.
    BlockId,
    "bb"
);
handle!(
    /// Index of a global in its module.
    GlobalId,
    "@g"
);

/// Position of an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct InstrRef {
    /// Owning function.
    pub function: FunctionId,
    /// Owning block.
    pub block: BlockId,
    /// Index inside the block.
    pub index: usize,
}

impl InstrRef {
    /// Creates an instruction reference.
    #[must_use]
    pub const fn new(function: FunctionId, block: BlockId, index: usize) -> Self {
        Self {
            function,
            block,
            index,
        }
    }
}

impl fmt::Display for InstrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:%{}", self.function, self.block, self.index)
    }
}

/// A program location that produces a value or names memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Place {
    /// A formal parameter.
    Argument {
        /// Owning function.
        function: FunctionId,
        /// Parameter position.
        index: usize,
    },
    /// The result of an instruction; for `alloca` also the allocated block.
    Instruction(InstrRef),
    /// A module-level variable.
    Global(GlobalId),
}

impl Place {
    /// Function owning the place, `None` for globals.
    #[must_use]
    pub fn function(&self) -> Option<FunctionId> {
        match self {
            Place::Argument { function, .. } => Some(*function),
            Place::Instruction(instr) => Some(instr.function),
            Place::Global(_) => None,
        }
    }
}

impl From<InstrRef> for Place {
    fn from(value: InstrRef) -> Self {
        Place::Instruction(value)
    }
}

impl From<GlobalId> for Place {
    fn from(value: GlobalId) -> Self {
        Place::Global(value)
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Argument { function, index } => write!(f, "{function}:arg{index}"),
            Place::Instruction(instr) => instr.fmt(f),
            Place::Global(global) => global.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_display() {
        let arg = Place::Argument {
            function: FunctionId::new(1),
            index: 0,
        };
        let instr = Place::Instruction(InstrRef::new(FunctionId::new(0), BlockId::new(2), 3));
        let global = Place::Global(GlobalId::new(0));
        assert!(arg < instr && instr < global);
        assert_eq!(arg.to_string(), "@f1:arg0");
        assert_eq!(instr.to_string(), "@f0:bb2:%3");
        assert_eq!(global.to_string(), "@g0");
        assert_eq!(global.function(), None);
        assert_eq!(instr.function(), Some(FunctionId::new(0)));
    }
}
