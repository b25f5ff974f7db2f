//! The active-feature set and the change lists that drive it.

/// One slot's worth of occupancy: a feature index with an occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub feature_index: u32,
    pub occurrences: i32,
}

/// A minimal diff to one slot of an [`ActiveSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub slot: u32,
    pub feature_index: u32,
    pub delta: i32,
}

/// Sparse slot -> (feature, occurrences) map. The number of slots is fixed
/// at construction (a tracker's `GetActiveSize()`).
#[derive(Debug, Clone)]
pub struct ActiveSet {
    slots: Vec<Option<Entry>>,
}

impl ActiveSet {
    pub fn new(num_slots: usize) -> ActiveSet {
        ActiveSet { slots: vec![None; num_slots] }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<Entry> {
        self.slots[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Entry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i, e)))
    }

    pub fn total_active(&self) -> i64 {
        self.iter().map(|(_, e)| e.occurrences as i64).sum()
    }

    /// Applies a single change to its slot.
    ///
    /// Writing a different feature index into a non-empty slot is an
    /// invariant violation: a programmer error, not a recoverable one (see
    /// `error::RuntimeError` doc comment in the crate root for the general
    /// policy). Debug builds catch it with an assertion; release builds
    /// silently corrupt the slot, matching the "undefined in release" error
    /// policy for invariant violations.
    pub fn apply(&mut self, change: Change) {
        let slot = &mut self.slots[change.slot as usize];
        match slot {
            None => {
                if change.delta != 0 {
                    *slot = Some(Entry { feature_index: change.feature_index, occurrences: change.delta });
                }
            }
            Some(entry) => {
                debug_assert_eq!(
                    entry.feature_index, change.feature_index,
                    "active-set slot {} holds feature {} but received a change for feature {}",
                    change.slot, entry.feature_index, change.feature_index
                );
                entry.occurrences += change.delta;
                if entry.occurrences == 0 {
                    *slot = None;
                }
            }
        }
    }

    pub fn apply_all(&mut self, changes: &[Change]) {
        for &c in changes {
            self.apply(c);
        }
    }

    /// Empties every slot. Used before replaying a from-scratch reset so a
    /// second `reset()` on the same tracker doesn't add to entries left over
    /// from the first.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

/// Reverses a change list's sign, for undo.
pub fn negate(changes: &[Change]) -> Vec<Change> {
    changes
        .iter()
        .map(|c| Change { slot: c.slot, feature_index: c.feature_index, delta: -c.delta })
        .collect()
}
