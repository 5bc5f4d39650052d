//! Inclusion-based points-to abstraction.
//!
//! A pointer value is an [`InclusionBased`] map from the *place* that introduced a target
//! (the allocation, the global, the instruction that turned an integer into an address) to
//! the [`Target`] itself. Two targets reaching the same place are merged into one instead of
//! being kept side by side, so the map never grows beyond the number of static places.
//!
//! Memory identities are [`Place`] handles. The pointer never owns the memory it names; the
//! memory blocks live in the [`State`] and are looked up on dereference.

use std::{collections::BTreeMap, fmt};

use crate::{
    domain::{ApInt, Container, Domain, Value},
    interpreter::State,
    ir::Place,
    utils::indent_except_first_line,
};

/// A single abstract target of a pointer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Target {
    /// The pointer was never given a value.
    Uninitialized,
    /// A numeric address that is not backed by tracked memory (`null`, `inttoptr`).
    Constant(Container),
    /// A memory block of the analysed program.
    Memory {
        /// Identity of the block: the allocating instruction or the global.
        location: Place,
        /// Element index when the pointer points into an array block.
        offset: Option<Container>,
    },
}

impl Target {
    fn tag(&self) -> &'static str {
        match self {
            Target::Uninitialized => "uninitialized",
            Target::Constant(_) => "constant",
            Target::Memory { .. } => "memory",
        }
    }

    /// Joins `other` into `self`.
    ///
    /// # Panics
    ///
    /// Aborts the analysis when the targets have different kinds or name different memory
    /// blocks. A missing offset joins as offset 0.
    pub fn merge(&mut self, other: &Self) {
        match (self, other) {
            (Target::Uninitialized, Target::Uninitialized) => {}
            (Target::Constant(a), Target::Constant(b)) => a.merge(b),
            (
                Target::Memory { location, offset },
                Target::Memory {
                    location: other_location,
                    offset: other_offset,
                },
            ) => {
                invariant!(
                    location == other_location,
                    "merging targets of different memory blocks {} and {}",
                    location,
                    other_location
                );
                let zero = |width| Container::from_constant(&ApInt::zero(width));
                *offset = match (offset.take(), other_offset) {
                    (None, None) => None,
                    (Some(a), None) => Some(a.joined(&zero(a.width()))),
                    (None, Some(b)) => Some(b.joined(&zero(b.width()))),
                    (Some(mut a), Some(b)) => {
                        a.merge(b);
                        Some(a)
                    }
                };
            }
            (this, other) => invariant!(format!(
                "merging {} target with {} target",
                this.tag(),
                other.tag()
            )),
        }
    }

    /// Returns `true` if the target denotes exactly one concrete address.
    #[must_use]
    pub fn is_single(&self) -> bool {
        match self {
            Target::Uninitialized => false,
            Target::Constant(address) => address.single_value().is_some(),
            Target::Memory { offset, .. } => offset
                .as_ref()
                .map_or(true, |offset| offset.single_value().is_some()),
        }
    }

    /// Reads the abstract value stored at the target.
    ///
    /// Returns `None` for targets without tracked memory and for memory not present in
    /// `state`.
    #[must_use]
    pub fn dereference(&self, state: &State) -> Option<Value> {
        let Target::Memory { location, offset } = self else {
            return None;
        };
        let block = state.find_block(location)?;
        match (offset, block) {
            (None, block) => Some(block.clone()),
            (Some(offset), Value::Array(array)) => array.get_value(offset),
            (Some(offset), block) => offset
                .may_contain(&ApInt::zero(offset.width()))
                .then(|| block.clone()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Uninitialized => write!(f, "uninitialized"),
            Target::Constant(address) => write!(f, "constant {address}"),
            Target::Memory {
                location,
                offset: None,
            } => write!(f, "memory {location}"),
            Target::Memory {
                location,
                offset: Some(offset),
            } => write!(f, "memory {location} offset {offset}"),
        }
    }
}

/// Pointer value: place to target map.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct InclusionBased {
    targets: BTreeMap<Place, Target>,
}

impl InclusionBased {
    /// A pointer without targets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A pointer to a numeric address introduced at `place`.
    #[must_use]
    pub fn constant(place: Place, address: Container) -> Self {
        let mut result = Self::new();
        result.add_target(place, Target::Constant(address));
        result
    }

    /// The targets keyed by the place that introduced them.
    #[must_use]
    pub fn targets(&self) -> &BTreeMap<Place, Target> {
        &self.targets
    }

    /// Returns `true` if the pointer has no target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Inserts a target at `place`, merging with the target already there.
    pub fn add_target(&mut self, place: Place, target: Target) {
        match self.targets.get_mut(&place) {
            Some(existing) => existing.merge(&target),
            None => {
                self.targets.insert(place, target);
            }
        }
    }

    /// Inserts or merges a memory target at `place`.
    pub fn add_memory_target(&mut self, place: Place, location: Place, offset: Option<Container>) {
        self.add_target(place, Target::Memory { location, offset });
    }

    /// Returns `true` if the pointer denotes exactly one concrete address.
    #[must_use]
    pub fn is_single_target(&self) -> bool {
        self.targets.len() == 1 && self.targets.values().all(Target::is_single)
    }

    /// Compares the target sets, ignoring the places that introduced them.
    #[must_use]
    pub fn same_targets(&self, other: &Self) -> bool {
        self.targets.len() == other.targets.len()
            && self
                .targets
                .values()
                .all(|target| other.targets.values().any(|t| t == target))
    }

    /// Joins the values stored at every target.
    ///
    /// Returns `None` when no target resolves to tracked memory.
    #[must_use]
    pub fn dereference(&self, state: &State) -> Option<Value> {
        self.targets
            .values()
            .filter_map(|target| target.dereference(state))
            .reduce(|mut acc, value| {
                acc.merge_or_havoc(&value);
                acc
            })
    }

    /// Rewrites the offset of every memory target.
    ///
    /// Non-memory targets are kept unchanged.
    #[must_use]
    pub fn map_offsets<F>(&self, f: F) -> Self
    where
        F: Fn(Option<&Container>) -> Option<Container>,
    {
        let targets = self
            .targets
            .iter()
            .map(|(place, target)| {
                let target = match target {
                    Target::Memory { location, offset } => Target::Memory {
                        location: *location,
                        offset: f(offset.as_ref()),
                    },
                    other => other.clone(),
                };
                (*place, target)
            })
            .collect();
        Self { targets }
    }
}

impl Domain for InclusionBased {
    fn merge(&mut self, other: &Self) {
        for (place, target) in &other.targets {
            self.add_target(*place, target.clone());
        }
    }

    fn widen(&mut self, other: &Self) {
        for (place, target) in &other.targets {
            if let (
                Some(Target::Memory {
                    location,
                    offset: Some(old),
                }),
                Target::Memory {
                    location: new_location,
                    offset: Some(new),
                },
            ) = (self.targets.get_mut(place), target)
            {
                if location == new_location {
                    old.widen(new);
                    continue;
                }
            }
            self.add_target(*place, target.clone());
        }
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .targets
                .values()
                .map(|target| {
                    std::mem::size_of::<Place>()
                        + std::mem::size_of::<Target>()
                        + match target {
                            Target::Constant(address) => address.memory_usage(),
                            Target::Memory {
                                offset: Some(offset),
                                ..
                            } => offset.memory_usage(),
                            _ => 0,
                        }
                })
                .sum::<usize>()
    }
}

impl fmt::Display for InclusionBased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets.is_empty() {
            return write!(f, "pointer empty");
        }
        let mut body = String::from("pointer");
        for (place, target) in &self.targets {
            body.push_str(&format!("\n{place} -> {target}"));
        }
        write!(f, "{}", indent_except_first_line(&body, 2))
    }
}
