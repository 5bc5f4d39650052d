//! Abstract program state at one program point.
//!
//! A [`State`] owns every abstract value it maps. States never share values: information
//! moves between them only through the explicit merge operations below, which deep-copy
//! what they take from the other state.

use std::{collections::BTreeMap, fmt};

use crate::{
    domain::{Domain, Value},
    ir::{FunctionId, Place},
    utils::indent_except_first_line,
};

/// Mapping from places to abstract values.
///
/// - *variables*: SSA results and arguments
/// - *blocks*: memory allocated by functions, keyed by the allocating instruction
/// - *globals*: module-level memory, keyed by [`Place::Global`]
/// - *returned*: the value of the `ret` that ends the block, if any
///
/// A place absent from every map is bottom: the program point defining it was not reached.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct State {
    variables: BTreeMap<Place, Value>,
    blocks: BTreeMap<Place, Value>,
    globals: BTreeMap<Place, Value>,
    returned: Option<Value>,
}

fn merge_entries<'a, I>(into: &mut BTreeMap<Place, Value>, from: I, widen: bool)
where
    I: IntoIterator<Item = (&'a Place, &'a Value)>,
{
    for (place, value) in from {
        match into.get_mut(place) {
            Some(existing) if widen => existing.widen(value),
            Some(existing) => existing.merge(value),
            None => {
                into.insert(*place, value.clone());
            }
        }
    }
}

impl State {
    /// An empty (bottom) state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.blocks.is_empty()
            && self.globals.is_empty()
            && self.returned.is_none()
    }

    /// SSA values and arguments.
    #[must_use]
    pub fn variables(&self) -> &BTreeMap<Place, Value> {
        &self.variables
    }

    /// Memory blocks allocated by functions.
    #[must_use]
    pub fn blocks(&self) -> &BTreeMap<Place, Value> {
        &self.blocks
    }

    /// Global memory blocks.
    #[must_use]
    pub fn globals(&self) -> &BTreeMap<Place, Value> {
        &self.globals
    }

    /// The returned value.
    #[must_use]
    pub fn returned(&self) -> Option<&Value> {
        self.returned.as_ref()
    }

    /// The SSA value or argument at `place`.
    #[must_use]
    pub fn variable(&self, place: &Place) -> Option<&Value> {
        self.variables.get(place)
    }

    /// Looks `place` up as a variable, then as a function memory block, then as a global.
    #[must_use]
    pub fn find_variable(&self, place: &Place) -> Option<&Value> {
        self.variables
            .get(place)
            .or_else(|| self.blocks.get(place))
            .or_else(|| self.globals.get(place))
    }

    /// The memory block named `place`, function or global.
    #[must_use]
    pub fn find_block(&self, place: &Place) -> Option<&Value> {
        self.blocks.get(place).or_else(|| self.globals.get(place))
    }

    /// Mutable access to the memory block named `place`.
    pub fn find_block_mut(&mut self, place: &Place) -> Option<&mut Value> {
        match self.blocks.get_mut(place) {
            Some(block) => Some(block),
            None => self.globals.get_mut(place),
        }
    }

    /// Binds `value` to the variable `place`, replacing the previous binding.
    pub fn bind(&mut self, place: Place, value: Value) {
        self.variables.insert(place, value);
    }

    /// Merges `value` into the memory block `place`, creating it if needed.
    ///
    /// Global places go to the global map.
    pub fn add_block(&mut self, place: Place, value: &Value) {
        let map = match place {
            Place::Global(_) => &mut self.globals,
            _ => &mut self.blocks,
        };
        merge_entries(map, [(&place, value)], false);
    }

    /// Sets the returned value.
    pub fn set_returned(&mut self, value: Value) {
        self.returned = Some(value);
    }

    /// Joins every map of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        merge_entries(&mut self.variables, &other.variables, false);
        self.merge_function_blocks(other);
        self.merge_global(other);
        self.merge_returned_value(other);
    }

    /// Widens `self`, the previous value, with `other`.
    pub fn widen_from(&mut self, other: &Self) {
        merge_entries(&mut self.variables, &other.variables, true);
        merge_entries(&mut self.blocks, &other.blocks, true);
        merge_entries(&mut self.globals, &other.globals, true);
        if let Some(other) = &other.returned {
            match &mut self.returned {
                Some(value) => value.widen(other),
                None => self.returned = Some(other.clone()),
            }
        }
    }

    /// Joins the global memory of `other`.
    pub fn merge_global(&mut self, other: &Self) {
        merge_entries(&mut self.globals, &other.globals, false);
    }

    /// Joins every function memory block of `other`.
    pub fn merge_function_blocks(&mut self, other: &Self) {
        merge_entries(&mut self.blocks, &other.blocks, false);
    }

    /// Joins the memory blocks of `other` that were not allocated by `function`.
    pub fn merge_foreign_function_blocks(&mut self, other: &Self, function: FunctionId) {
        let foreign = other
            .blocks
            .iter()
            .filter(|(place, _)| place.function() != Some(function));
        merge_entries(&mut self.blocks, foreign, false);
    }

    /// Joins the returned value of `other`.
    pub fn merge_returned_value(&mut self, other: &Self) {
        if let Some(other) = &other.returned {
            match &mut self.returned {
                Some(value) => value.merge(other),
                None => self.returned = Some(other.clone()),
            }
        }
    }

    /// Rough estimate of the bytes held by the state.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let entries = |map: &BTreeMap<Place, Value>| {
            map.values()
                .map(|value| std::mem::size_of::<Place>() + value.memory_usage())
                .sum::<usize>()
        };
        std::mem::size_of::<Self>()
            + entries(&self.variables)
            + entries(&self.blocks)
            + entries(&self.globals)
            + self.returned.as_ref().map_or(0, Value::memory_usage)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = String::from("state");
        for (title, map) in [
            ("variables", &self.variables),
            ("blocks", &self.blocks),
            ("globals", &self.globals),
        ] {
            if map.is_empty() {
                continue;
            }
            let mut section = format!("{title}:");
            for (place, value) in map {
                section.push_str(&format!("\n{place} = {value}"));
            }
            body.push('\n');
            body.push_str(&indent_except_first_line(&section, 2));
        }
        if let Some(value) = &self.returned {
            body.push_str(&format!("\nreturned: {value}"));
        }
        write!(f, "{}", indent_except_first_line(&body, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ApInt, Container},
        ir::{BlockId, GlobalId, InstrRef},
    };

    fn int(value: u64) -> Value {
        Value::Integer(Container::from_constant(&ApInt::new(8, value)))
    }

    fn local(function: usize, index: usize) -> Place {
        Place::Instruction(InstrRef::new(
            FunctionId::new(function),
            BlockId::new(0),
            index,
        ))
    }

    #[test]
    fn test_merge_joins_every_map() {
        let mut a = State::new();
        a.bind(local(0, 0), int(1));
        a.add_block(Place::Global(GlobalId::new(0)), &int(3));
        let mut b = State::new();
        b.bind(local(0, 0), int(2));
        b.bind(local(0, 1), int(7));
        b.set_returned(int(9));
        a.merge(&b);

        let joined = a.variable(&local(0, 0)).and_then(Value::as_integer).unwrap();
        assert!(joined.may_contain(&ApInt::new(8, 1)));
        assert!(joined.may_contain(&ApInt::new(8, 2)));
        assert_eq!(a.variable(&local(0, 1)), Some(&int(7)));
        assert_eq!(a.returned(), Some(&int(9)));
        assert!(a.find_block(&Place::Global(GlobalId::new(0))).is_some());
        assert!(a.globals().contains_key(&Place::Global(GlobalId::new(0))));
    }

    #[test]
    fn test_lookup_order() {
        let mut state = State::new();
        let place = local(0, 0);
        state.add_block(place, &int(5));
        assert_eq!(state.find_variable(&place), Some(&int(5)));
        state.bind(place, int(6));
        assert_eq!(state.find_variable(&place), Some(&int(6)));
        assert_eq!(state.find_block(&place), Some(&int(5)));
    }

    #[test]
    fn test_foreign_blocks() {
        let mut callee = State::new();
        callee.add_block(local(0, 0), &int(1));
        callee.add_block(local(1, 0), &int(2));
        let mut output = State::new();
        output.merge_foreign_function_blocks(&callee, FunctionId::new(1));
        assert!(output.find_block(&local(0, 0)).is_some());
        assert!(output.find_block(&local(1, 0)).is_none());
    }

    #[test]
    fn test_display() {
        let mut state = State::new();
        state.bind(local(0, 0), int(1));
        state.set_returned(int(1));
        assert_eq!(
            state.to_string(),
            "state\n  variables:\n    @f0:bb0:%0 = i8 0x1 (1)\n  returned: i8 0x1 (1)"
        );
        assert!(state.memory_usage() > 0);
    }
}
