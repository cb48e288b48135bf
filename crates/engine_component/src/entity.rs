//! Entity identifiers and the recycling allocator.
//!
//! An [`EntityId`] is a small `u32` index with no inherent data. It exists only
//! to correlate records across component pools, so the raw value doubles as
//! the key into every pool's sparse index table.
//!
//! Destroyed identifiers are handed out again by later allocations. Uniqueness
//! therefore holds among *currently alive* entities only.

use fixedbitset::FixedBitSet;

/// An opaque, recyclable entity identifier.
///
/// Ordering and hashing follow the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// The invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(u32::MAX);

    /// Create an entity from a raw `u32` value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw `u32` value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the raw value widened for indexing sparse tables.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` unless this is [`EntityId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "Entity({})", self.0)
        } else {
            f.write_str("Entity(invalid)")
        }
    }
}

/// Allocates entity identifiers, recycling destroyed ones.
///
/// Liveness is tracked in a dense bitset keyed by the raw value. An id is
/// alive exactly when it has been handed out and is not sitting in the free
/// list.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next_id: u32,
    free: Vec<EntityId>,
    alive: FixedBitSet,
}

impl EntityAllocator {
    /// Creates an empty allocator. The first id handed out is `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an allocator with room for `capacity` ids before the bitset
    /// has to grow.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: 0,
            free: Vec::new(),
            alive: FixedBitSet::with_capacity(capacity),
        }
    }

    /// Hands out an id: the most recently freed one if any, otherwise the
    /// next never-used value.
    ///
    /// Returns `None` once every value below [`EntityId::INVALID`] is alive.
    pub fn allocate(&mut self) -> Option<EntityId> {
        if let Some(entity) = self.free.pop() {
            self.alive.insert(entity.index());
            return Some(entity);
        }

        if self.next_id == u32::MAX {
            return None;
        }
        let entity = EntityId(self.next_id);
        self.next_id += 1;
        if entity.index() >= self.alive.len() {
            self.alive.grow(entity.index() + 1);
        }
        self.alive.insert(entity.index());
        Some(entity)
    }

    /// An allocator whose fresh ids start at `next_id`.
    #[cfg(test)]
    pub(crate) fn starting_at(next_id: u32) -> Self {
        Self {
            next_id,
            ..Self::new()
        }
    }

    /// Marks `entity` dead and pushes it onto the free list.
    ///
    /// Returns `false` (and changes nothing) if `entity` was not alive.
    pub fn free(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.alive.set(entity.index(), false);
        self.free.push(entity);
        true
    }

    /// Returns `true` if `entity` has been allocated and not freed since.
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        entity.is_valid() && self.alive.contains(entity.index())
    }

    /// Returns the number of currently alive ids.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.next_id as usize - self.free.len()
    }

    /// Returns the number of ids waiting in the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Returns how many distinct values have ever been handed out.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.next_id as usize
    }

    /// Iterates over every alive id in ascending order.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.ones().map(|i| EntityId(i as u32))
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_entity_from_raw() {
        let e = EntityId::from_raw(42);
        assert_eq!(e.value(), 42);
        assert!(e.is_valid());
    }

    #[test]
    fn test_entity_invalid() {
        assert!(!EntityId::INVALID.is_valid());
        assert_eq!(EntityId::default(), EntityId::INVALID);
        assert_eq!(EntityId::INVALID.to_string(), "Entity(invalid)");
    }

    #[test]
    fn test_entity_ordering_follows_value() {
        assert!(EntityId::from_raw(3) < EntityId::from_raw(7));
        assert!(EntityId::from_raw(7) < EntityId::INVALID);
    }

    #[test]
    fn test_allocator_produces_sequential_ids() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate().unwrap();
        let e1 = alloc.allocate().unwrap();
        let e2 = alloc.allocate().unwrap();
        assert_eq!((e0.value(), e1.value(), e2.value()), (0, 1, 2));
        assert_eq!(alloc.alive_count(), 3);
    }

    #[test]
    fn test_allocator_recycles_most_recent_first() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let _c = alloc.allocate().unwrap();

        assert!(alloc.free(a));
        assert!(alloc.free(b));
        assert!(!alloc.is_alive(b));
        assert_eq!(alloc.free_count(), 2);

        assert_eq!(alloc.allocate().unwrap(), b);
        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.allocate().unwrap().value(), 3);
        assert_eq!(alloc.high_water_mark(), 4);
    }

    #[test]
    fn test_allocator_double_free_rejected() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate().unwrap();
        assert!(alloc.free(a));
        assert!(!alloc.free(a));
        assert_eq!(alloc.free_count(), 1);
        assert!(!alloc.free(EntityId::INVALID));
        assert!(!alloc.free(EntityId::from_raw(99)));
    }

    #[test]
    fn test_allocator_alive_set_matches_free_list() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut alloc = EntityAllocator::with_capacity(8);
        let mut live: Vec<EntityId> = Vec::new();

        for _ in 0..2_000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                live.push(alloc.allocate().unwrap());
            } else {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                assert!(alloc.free(victim));
            }

            let unique: HashSet<EntityId> = live.iter().copied().collect();
            assert_eq!(unique.len(), live.len(), "two alive entities share a value");
            assert_eq!(alloc.alive_count(), live.len());
            assert_eq!(alloc.alive_count() + alloc.free_count(), alloc.high_water_mark());
        }

        let mut expected = live.clone();
        expected.sort();
        assert_eq!(alloc.iter_alive().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_allocator_exhaustion_is_reported() {
        let mut alloc = EntityAllocator::starting_at(u32::MAX);
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.free_count(), 0);
    }
}
