//! Sparse index table shared by every pool flavour.
//!
//! Maps an entity's raw value to the dense slot holding its record. Slots
//! beyond the table's length, and slots holding [`SparseIndex::EMPTY`], mean
//! "no record".

use crate::entity::EntityId;

#[derive(Debug, Clone, Default)]
pub(crate) struct SparseIndex {
    slots: Vec<u32>,
}

impl SparseIndex {
    pub(crate) const EMPTY: u32 = u32::MAX;

    /// Dense slot of `entity`, if it has one.
    #[inline]
    pub(crate) fn get(&self, entity: EntityId) -> Option<usize> {
        if !entity.is_valid() {
            return None;
        }
        match self.slots.get(entity.index()) {
            Some(&slot) if slot != Self::EMPTY => Some(slot as usize),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn contains(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    /// Point `entity` at `dense`, growing the table if needed.
    pub(crate) fn set(&mut self, entity: EntityId, dense: usize) {
        debug_assert!(entity.is_valid());
        debug_assert!(dense < Self::EMPTY as usize);
        let at = entity.index();
        if at >= self.slots.len() {
            self.slots.resize(at + 1, Self::EMPTY);
        }
        self.slots[at] = dense as u32;
    }

    pub(crate) fn invalidate(&mut self, entity: EntityId) {
        if let Some(slot) = self.slots.get_mut(entity.index()) {
            *slot = Self::EMPTY;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}
