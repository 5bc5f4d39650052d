//! Aggregate abstraction.
//!
//! Small arrays keep one abstract value per element ([`Array::Exact`]); larger ones are
//! summarised by a single value standing for every element ([`Array::Summary`]). Reads
//! through an abstract offset join every element the offset may select. Writes through a
//! non-singleton offset weakly update (merge into) every element they may touch.

use std::fmt;

use crate::{
    domain::{ApInt, Container, Domain, Value},
    utils::indent_except_first_line,
};

/// Largest array length tracked element by element.
pub const EXACT_ARRAY_LIMIT: u64 = 256;

/// Abstract array contents.
#[derive(Clone, PartialEq, Debug)]
pub enum Array {
    /// One value per element.
    Exact(Vec<Value>),
    /// One value for all elements.
    Summary(Box<Value>),
}

impl Array {
    /// Builds an array of `length` copies of `item`, summarised above the limit.
    #[must_use]
    pub fn filled(length: u64, item: Value) -> Self {
        if length <= EXACT_ARRAY_LIMIT {
            let length = usize::try_from(length).unwrap_or_default();
            Array::Exact(vec![item; length])
        } else {
            Array::Summary(Box::new(item))
        }
    }

    /// Number of tracked items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            Array::Exact(items) => items.len(),
            Array::Summary(_) => 1,
        }
    }

    fn candidates(&self, offset: &Container) -> Vec<usize> {
        match self {
            Array::Exact(items) => (0..items.len())
                .filter(|index| {
                    let width = offset.width();
                    let index = *index as u64;
                    (width >= 64 || index >> width == 0)
                        && offset.may_contain(&ApInt::new(width, index))
                })
                .collect(),
            Array::Summary(_) => vec![0],
        }
    }

    /// Every item `offset` may select.
    #[must_use]
    pub fn get_items(&self, offset: &Container) -> Vec<&Value> {
        let candidates = self.candidates(offset);
        match self {
            Array::Exact(items) => candidates.into_iter().map(|index| &items[index]).collect(),
            Array::Summary(item) => vec![item.as_ref()],
        }
    }

    /// The join of every item `offset` may select, `None` if it selects nothing.
    #[must_use]
    pub fn get_value(&self, offset: &Container) -> Option<Value> {
        self.get_items(offset).into_iter().fold(None, |acc, item| {
            Some(match acc {
                Some(mut acc) => {
                    acc.merge_or_havoc(item);
                    acc
                }
                None => item.clone(),
            })
        })
    }

    /// The item at a concrete index.
    #[must_use]
    pub fn get_item(&self, index: u64) -> Option<&Value> {
        match self {
            Array::Exact(items) => usize::try_from(index).ok().and_then(|i| items.get(i)),
            Array::Summary(item) => Some(item),
        }
    }

    /// Writes `value` through `offset`.
    ///
    /// A `strong` write through a singleton offset replaces the element. Every other write
    /// merges into each element the offset may touch.
    pub fn set_item(&mut self, offset: &Container, value: &Value, strong: bool) {
        let candidates = self.candidates(offset);
        let single = offset.single_value().is_some() && candidates.len() == 1;
        match self {
            Array::Exact(items) => {
                for index in candidates {
                    let item = &mut items[index];
                    if strong && single && item.same_shape(value) {
                        *item = value.clone();
                    } else {
                        item.merge_or_havoc(value);
                    }
                }
            }
            Array::Summary(item) => item.merge_or_havoc(value),
        }
    }

    fn check_shape(&self, other: &Self) {
        let same = match (self, other) {
            (Array::Exact(a), Array::Exact(b)) => a.len() == b.len(),
            (Array::Summary(_), Array::Summary(_)) => true,
            _ => false,
        };
        invariant!(same, "merging arrays of different shapes");
    }
}

impl Domain for Array {
    fn merge(&mut self, other: &Self) {
        self.check_shape(other);
        match (self, other) {
            (Array::Exact(items), Array::Exact(others)) => {
                for (item, other) in items.iter_mut().zip(others) {
                    item.merge(other);
                }
            }
            (Array::Summary(item), Array::Summary(other)) => item.merge(other),
            _ => {}
        }
    }

    fn widen(&mut self, other: &Self) {
        self.check_shape(other);
        match (self, other) {
            (Array::Exact(items), Array::Exact(others)) => {
                for (item, other) in items.iter_mut().zip(others) {
                    item.widen(other);
                }
            }
            (Array::Summary(item), Array::Summary(other)) => item.widen(other),
            _ => {}
        }
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Array::Exact(items) => items.iter().map(Value::memory_usage).sum(),
                Array::Summary(item) => item.memory_usage(),
            }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self {
            Array::Exact(items) => {
                let mut body = format!("array [{}]", items.len());
                for (index, item) in items.iter().enumerate() {
                    body.push_str(&format!("\n[{index}] {item}"));
                }
                body
            }
            Array::Summary(item) => format!("array summary\n[*] {item}"),
        };
        write!(f, "{}", indent_except_first_line(&body, 2))
    }
}
