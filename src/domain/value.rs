use std::fmt;

use crate::domain::{AccuracyValue, Array, Container, Domain, FloatRange, InclusionBased};

/// Abstract value held by a variable or a memory block.
///
/// The set of kinds is closed; the interpreter dispatches on the variant instead of going
/// through trait objects.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    /// Integer of any supported width.
    Integer(Container),
    /// Double precision float.
    Float(FloatRange),
    /// Pointer.
    Pointer(InclusionBased),
    /// Array memory block.
    Array(Array),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Pointer(_) => "pointer",
            Value::Array(_) => "array",
        }
    }

    /// Returns `true` if `other` has the same kind and, for integers and arrays, the same
    /// width and length.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.width() == b.width(),
            (Value::Float(_), Value::Float(_)) | (Value::Pointer(_), Value::Pointer(_)) => true,
            (Value::Array(Array::Exact(a)), Value::Array(Array::Exact(b))) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_shape(b))
            }
            (Value::Array(Array::Summary(a)), Value::Array(Array::Summary(b))) => a.same_shape(b),
            _ => false,
        }
    }

    /// Forgets everything known about the value, keeping its shape.
    ///
    /// Pointer targets are kept: a pointer can only be made less precise by adding targets,
    /// and there is no finite "every target" element.
    pub fn havoc(&mut self) {
        match self {
            Value::Integer(container) => container.set_top(),
            Value::Float(float) => float.set_top(),
            Value::Pointer(_) => {}
            Value::Array(Array::Exact(items)) => items.iter_mut().for_each(Value::havoc),
            Value::Array(Array::Summary(item)) => item.havoc(),
        }
    }

    /// Joins `other` into `self`, or havocs `self` when the shapes differ.
    ///
    /// Used where memory is reinterpreted through a differently typed pointer, which the
    /// domains cannot follow precisely.
    pub fn merge_or_havoc(&mut self, other: &Self) {
        if self.same_shape(other) {
            self.merge(other);
        } else {
            log::trace!("havoc on {} / {} shape mismatch", self.kind(), other.kind());
            self.havoc();
        }
    }

    /// Accuracy interface of integer and float values.
    #[must_use]
    pub fn as_accuracy(&self) -> Option<&dyn AccuracyValue> {
        match self {
            Value::Integer(container) => Some(container),
            Value::Float(float) => Some(float),
            Value::Pointer(_) | Value::Array(_) => None,
        }
    }

    /// The integer abstraction, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<&Container> {
        match self {
            Value::Integer(container) => Some(container),
            _ => None,
        }
    }

    /// The float abstraction, if this is a float.
    #[must_use]
    pub fn as_float(&self) -> Option<&FloatRange> {
        match self {
            Value::Float(float) => Some(float),
            _ => None,
        }
    }

    /// The pointer abstraction, if this is a pointer.
    #[must_use]
    pub fn as_pointer(&self) -> Option<&InclusionBased> {
        match self {
            Value::Pointer(pointer) => Some(pointer),
            _ => None,
        }
    }

    /// The array abstraction, if this is an array block.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl Domain for Value {
    fn merge(&mut self, other: &Self) {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.merge(b),
            (Value::Float(a), Value::Float(b)) => a.merge(b),
            (Value::Pointer(a), Value::Pointer(b)) => a.merge(b),
            (Value::Array(a), Value::Array(b)) => a.merge(b),
            (this, other) => invariant!(format!(
                "merging {} value with {} value",
                this.kind(),
                other.kind()
            )),
        }
    }

    fn widen(&mut self, other: &Self) {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.widen(b),
            (Value::Float(a), Value::Float(b)) => a.widen(b),
            (Value::Pointer(a), Value::Pointer(b)) => a.widen(b),
            (Value::Array(a), Value::Array(b)) => a.widen(b),
            (this, other) => invariant!(format!(
                "widening {} value with {} value",
                this.kind(),
                other.kind()
            )),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            Value::Integer(container) => container.memory_usage(),
            Value::Float(float) => float.memory_usage(),
            Value::Pointer(pointer) => pointer.memory_usage(),
            Value::Array(array) => array.memory_usage(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(container) => container.fmt(f),
            Value::Float(float) => float.fmt(f),
            Value::Pointer(pointer) => pointer.fmt(f),
            Value::Array(array) => array.fmt(f),
        }
    }
}

impl From<Container> for Value {
    fn from(value: Container) -> Self {
        Value::Integer(value)
    }
}

impl From<FloatRange> for Value {
    fn from(value: FloatRange) -> Self {
        Value::Float(value)
    }
}

impl From<InclusionBased> for Value {
    fn from(value: InclusionBased) -> Self {
        Value::Pointer(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApInt;

    fn int(width: u32, value: u64) -> Value {
        Value::Integer(Container::from_constant(&ApInt::new(width, value)))
    }

    #[test]
    fn test_merge_or_havoc() {
        let mut value = int(8, 1);
        value.merge_or_havoc(&int(8, 2));
        assert!(value.as_integer().unwrap().may_contain(&ApInt::new(8, 2)));
        assert!(!value.as_integer().unwrap().is_top());

        value.merge_or_havoc(&int(16, 2));
        assert!(value.as_integer().unwrap().is_top());
        assert_eq!(value.as_integer().unwrap().width(), 8);
    }

    #[test]
    fn test_havoc_keeps_pointers() {
        let mut pointer = Value::Pointer(InclusionBased::new());
        pointer.havoc();
        assert_eq!(pointer, Value::Pointer(InclusionBased::new()));

        let mut array = Value::Array(Array::filled(2, int(8, 3)));
        array.havoc();
        let Some(Array::Exact(items)) = array.as_array() else {
            panic!("expected an exact array");
        };
        assert!(items.iter().all(|item| item.as_integer().unwrap().is_top()));
    }

    #[test]
    fn test_accuracy_view() {
        assert_eq!(int(8, 1).as_accuracy().map(AccuracyValue::accuracy), Some(1.0));
        assert!(Value::Float(FloatRange::top()).as_accuracy().unwrap().is_top());
        assert!(Value::Pointer(InclusionBased::new()).as_accuracy().is_none());
    }

    #[test]
    #[should_panic(expected = "merging integer value with float value")]
    fn test_kind_mismatch_faults() {
        let mut value = int(8, 1);
        value.merge(&Value::Float(FloatRange::top()));
    }
}
