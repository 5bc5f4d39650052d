//! Initial abstract values shaped after static types.

use crate::{
    domain::{ApInt, Array, Container, FloatRange, InclusionBased, Value},
    ir::{Constant, Global, IrType, Place},
};

/// Width of numeric addresses.
pub const ADDRESS_WIDTH: u32 = 64;

/// The bottom value of `ty`: no concrete value, an empty pointer, or an array of bottoms.
///
/// `None` for `void`.
#[must_use]
pub fn create(ty: &IrType) -> Option<Value> {
    Some(match ty {
        IrType::Void => return None,
        IrType::Integer(width) => Value::Integer(Container::bottom(*width)),
        IrType::Float => Value::Float(FloatRange::bottom()),
        IrType::Pointer(_) => Value::Pointer(InclusionBased::new()),
        IrType::Array { length, element } => Value::Array(Array::filled(*length, create(element)?)),
    })
}

/// The top value of `ty` produced at `place`.
///
/// Pointers have no finite top over memory blocks. They become a pointer to an unknown
/// constant address introduced at `place`, so loads through them yield top.
#[must_use]
pub fn create_top(ty: &IrType, place: Place) -> Option<Value> {
    Some(match ty {
        IrType::Void => return None,
        IrType::Integer(width) => Value::Integer(Container::top(*width)),
        IrType::Float => Value::Float(FloatRange::top()),
        IrType::Pointer(_) => Value::Pointer(InclusionBased::constant(
            place,
            Container::top(ADDRESS_WIDTH),
        )),
        IrType::Array { length, element } => {
            Value::Array(Array::filled(*length, create_top(element, place)?))
        }
    })
}

/// The value of a literal operand consumed at `place`.
///
/// `null` becomes a pointer to the constant address 0 introduced at `place`.
#[must_use]
pub fn constant(constant: &Constant, place: Place) -> Option<Value> {
    match constant {
        Constant::Int(value) => Some(Value::Integer(Container::from_constant(value))),
        Constant::Float(value) => Some(Value::Float(FloatRange::from_constant(*value))),
        Constant::Null => Some(Value::Pointer(InclusionBased::constant(
            place,
            Container::from_constant(&ApInt::zero(ADDRESS_WIDTH)),
        ))),
        Constant::Undef(ty) => create_top(ty, place),
    }
}

/// Initial contents of a global.
///
/// Globals without an initializer may be written by code outside of the module, so their
/// contents start as top.
#[must_use]
pub fn global(global: &Global, place: Place) -> Option<Value> {
    match &global.initializer {
        Some(initializer) => {
            let value = constant(initializer, place)?;
            let expected = create(&global.ty)?;
            if value.same_shape(&expected) {
                Some(value)
            } else {
                create_top(&global.ty, place)
            }
        }
        None => create_top(&global.ty, place),
    }
}

/// Converts an integer to `width` bits, extending by `signed`.
#[must_use]
pub fn resize(value: &Container, width: u32, signed: bool) -> Container {
    use std::cmp::Ordering;

    match value.width().cmp(&width) {
        Ordering::Equal => value.clone(),
        Ordering::Greater => value.trunc(width),
        Ordering::Less if signed => value.sext(width),
        Ordering::Less => value.zext(width),
    }
}
