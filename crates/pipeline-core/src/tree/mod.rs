//! Process-local tree-parameter event model.
//!
//! Grounded on `TreeParameter.h`/`.cpp`'s shared metadata block, dense
//! event vector and scoreboard. The original stores the last-written
//! generation in metadata shared across every handle of the same name,
//! reached through a raw pointer; this models the same sharing through a
//! stable numeric id into a registry owned by one struct, never a pointer,
//! per the redesign note on process-global state.

use std::collections::HashMap;

/// Axis/display metadata for one parameter. Never read by pipeline logic;
/// carried only as convention (low=0, high=100, bins=100, units="Chans"
/// unless overridden at bind time).
#[derive(Debug, Clone, PartialEq)]
pub struct AxisHint {
    pub low: f64,
    pub high: f64,
    pub bins: u32,
    pub units: String,
}

impl Default for AxisHint {
    fn default() -> Self {
        Self { low: 0.0, high: 100.0, bins: 100, units: "Chans".to_string() }
    }
}

struct Slot {
    name: String,
    axis: AxisHint,
    last_written_generation: u64,
}

/// A registry of named parameters plus the dense per-generation event
/// state (value vector, scoreboard of ids touched this generation, and a
/// monotonic generation counter). One instance per process/role.
pub struct TreeRegistry {
    by_name: HashMap<String, u32>,
    slots: Vec<Slot>,
    event: Vec<f64>,
    scoreboard: Vec<u32>,
    generation: u64,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self { by_name: HashMap::new(), slots: Vec::new(), event: Vec::new(), scoreboard: Vec::new(), generation: 0 }
    }

    /// Look up or create a registry entry for `name`. Binding the same
    /// name twice is legal: it returns the same id, and the metadata is
    /// overwritten with `axis`.
    pub fn bind(&mut self, name: &str, axis: AxisHint) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            self.slots[id as usize].axis = axis;
            return id;
        }
        let id = self.slots.len() as u32;
        // A fresh slot must never report valid until it is actually assigned,
        // even at generation 0, so it starts on a generation no real
        // generation counter ever reaches rather than sharing generation 0.
        self.slots.push(Slot { name: name.to_string(), axis, last_written_generation: u64::MAX });
        self.by_name.insert(name.to_string(), id);
        if self.event.len() <= id as usize {
            self.event.resize(id as usize + 1, 0.0);
        }
        id
    }

    /// Set `event[id] = v`. If this is the slot's first assignment this
    /// generation, append it to the scoreboard.
    pub fn assign(&mut self, id: u32, v: f64) {
        self.event[id as usize] = v;
        let slot = &mut self.slots[id as usize];
        if slot.last_written_generation != self.generation {
            slot.last_written_generation = self.generation;
            self.scoreboard.push(id);
        }
    }

    /// True iff `id` was assigned during the current generation.
    pub fn is_valid(&self, id: u32) -> bool {
        self.slots[id as usize].last_written_generation == self.generation
    }

    /// The `(id, value)` pairs assigned this generation, in assignment order.
    pub fn collect(&self) -> Vec<(u32, f64)> {
        self.scoreboard.iter().map(|&id| (id, self.event[id as usize])).collect()
    }

    /// Advance to the next generation, invalidating every slot in O(1).
    pub fn next_event(&mut self) {
        self.generation += 1;
        self.scoreboard.clear();
    }

    /// The id registered for `name`, if bound.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// The name registered for `id`.
    pub fn name_of(&self, id: u32) -> &str {
        &self.slots[id as usize].name
    }

    pub fn axis_of(&self, id: u32) -> &AxisHint {
        &self.slots[id as usize].axis
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for TreeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_is_idempotent_by_name() {
        let mut reg = TreeRegistry::new();
        let a = reg.bind("scalar", AxisHint::default());
        let b = reg.bind("scalar", AxisHint::default());
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn freshly_bound_slot_is_invalid_before_any_assignment() {
        let mut reg = TreeRegistry::new();
        let id = reg.bind("x", AxisHint::default());
        assert!(!reg.is_valid(id));
    }

    #[test]
    fn next_event_invalidates_every_slot() {
        let mut reg = TreeRegistry::new();
        let id = reg.bind("x", AxisHint::default());
        reg.assign(id, 1.0);
        assert!(reg.is_valid(id));
        reg.next_event();
        assert!(!reg.is_valid(id));
    }

    #[test]
    fn collect_returns_assignments_in_first_touch_order() {
        let mut reg = TreeRegistry::new();
        let a = reg.bind("a", AxisHint::default());
        let b = reg.bind("b", AxisHint::default());
        reg.assign(b, 2.0);
        reg.assign(a, 1.0);
        assert_eq!(reg.collect(), vec![(b, 2.0), (a, 1.0)]);
    }

    #[test]
    fn reassigning_within_a_generation_does_not_duplicate_scoreboard_entry() {
        let mut reg = TreeRegistry::new();
        let id = reg.bind("x", AxisHint::default());
        reg.assign(id, 1.0);
        reg.assign(id, 2.0);
        assert_eq!(reg.collect(), vec![(id, 2.0)]);
    }

    #[test]
    fn default_axis_hint_matches_convention() {
        let axis = AxisHint::default();
        assert_eq!(axis.low, 0.0);
        assert_eq!(axis.high, 100.0);
        assert_eq!(axis.bins, 100);
        assert_eq!(axis.units, "Chans");
    }
}
