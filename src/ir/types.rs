//! Static types of the program representation.

use std::fmt;

use crate::domain::apint::MAX_WIDTH;

/// Type of a value, global or function parameter.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum IrType {
    /// No value; only valid as a function return type.
    Void,
    /// Fixed-width integer of the given bit width.
    Integer(u32),
    /// IEEE double.
    Float,
    /// Pointer to the element type.
    Pointer(Box<IrType>),
    /// Statically sized array.
    Array {
        /// Number of elements.
        length: u64,
        /// Element type.
        element: Box<IrType>,
    },
}

impl IrType {
    /// `i1`, the type of comparison results.
    #[must_use]
    pub fn bool() -> Self {
        IrType::Integer(1)
    }

    /// Pointer to `element`.
    #[must_use]
    pub fn pointer_to(element: IrType) -> Self {
        IrType::Pointer(Box::new(element))
    }

    /// Array of `length` elements.
    #[must_use]
    pub fn array_of(length: u64, element: IrType) -> Self {
        IrType::Array {
            length,
            element: Box::new(element),
        }
    }

    /// Bit width of an integer type.
    #[must_use]
    pub fn integer_width(&self) -> Option<u32> {
        match self {
            IrType::Integer(width) => Some(*width),
            _ => None,
        }
    }

    /// Pointee of a pointer type.
    #[must_use]
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Pointer(element) => Some(element),
            _ => None,
        }
    }

    /// Returns `true` for pointer types.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Pointer(_))
    }

    /// Returns `true` if every integer nested in the type has a supported width.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            IrType::Integer(width) => (1..=MAX_WIDTH).contains(width),
            IrType::Pointer(element) | IrType::Array { element, .. } => element.is_supported(),
            IrType::Void | IrType::Float => true,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Integer(width) => write!(f, "i{width}"),
            IrType::Float => write!(f, "double"),
            IrType::Pointer(element) => write!(f, "{element}*"),
            IrType::Array { length, element } => write!(f, "[{length} x {element}]"),
        }
    }
}
