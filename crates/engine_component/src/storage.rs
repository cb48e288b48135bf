//! Component pools.
//!
//! A pool stores every record of one component kind in two parallel dense
//! arrays (values and owning entities) plus a [`SparseIndex`] from entity to
//! dense slot. Lookups are a bounds check and one indirection.
//!
//! Three traits sit on top of the concrete pools:
//!
//! - [`ComponentStorage`] is the typed interface the registry and queries use
//!   through static dispatch.
//! - [`ComponentStorageMut`] adds in-place mutation. Pools whose layout
//!   depends on record contents (the hierarchical pool) do not implement it.
//! - [`ErasedPool`] is the object-safe interface the registry keeps behind
//!   `Box<dyn ErasedPool>`. Its only job besides introspection is
//!   [`ErasedPool::remove_entity`], which lets `destroy` purge an entity from
//!   every pool without knowing the concrete kinds.

use std::any::Any;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{EcsError, EcsResult};
use crate::sparse::SparseIndex;

/// Typed access to a pool of `C` records.
pub trait ComponentStorage<C>: 'static {
    /// Creates an empty pool with room for `capacity` records.
    fn with_capacity(capacity: usize) -> Self
    where
        Self: Sized;

    /// Stores `value` for `entity` and returns a handle to the stored value.
    ///
    /// Fails without mutating anything if `entity` already has a record.
    fn insert(&mut self, entity: EntityId, value: C) -> EcsResult<&C>;

    fn get(&self, entity: EntityId) -> Option<&C>;

    fn contains(&self, entity: EntityId) -> bool;

    /// Removes the record of `entity`, plus whatever the pool flavour removes
    /// alongside it. Returns `false` if `entity` had no record.
    fn remove(&mut self, entity: EntityId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owners in dense order.
    fn entities(&self) -> &[EntityId];

    /// Values in dense order, parallel to [`ComponentStorage::entities`].
    fn values(&self) -> &[C];
}

/// Pools that allow records to be edited in place.
pub trait ComponentStorageMut<C>: ComponentStorage<C> {
    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C>;
}

/// Kind-agnostic view of a pool, stored by the registry as a trait object.
pub trait ErasedPool: Any {
    /// Removes `entity`'s record if present. Absent entities are ignored.
    fn remove_entity(&mut self, entity: EntityId);

    /// Drops every record.
    fn clear_records(&mut self);

    fn contains_entity(&self, entity: EntityId) -> bool;

    fn record_count(&self) -> usize;

    fn component_name(&self) -> &'static str;

    fn is_hierarchical(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense, swap-remove pool for an ordinary component kind.
///
/// Iteration order is insertion order until a removal moves the last record
/// into the vacated slot. The arrays never contain holes.
#[derive(Debug, Clone)]
pub struct ComponentPool<C> {
    values: Vec<C>,
    owners: Vec<EntityId>,
    index: SparseIndex,
}

impl<C> ComponentPool<C> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty pool with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            index: SparseIndex::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains(entity)
    }

    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.index.get(entity).map(|slot| &self.values[slot])
    }

    #[must_use]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.index.get(entity).map(|slot| &mut self.values[slot])
    }

    /// Swap-removes `entity`'s record and returns it.
    ///
    /// The last record moves into the vacated slot, so this is O(1). Returns
    /// `None` and leaves the pool untouched if `entity` has no record.
    pub fn remove(&mut self, entity: EntityId) -> Option<C> {
        let slot = self.index.get(entity)?;
        let value = self.values.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(&moved) = self.owners.get(slot) {
            self.index.set(moved, slot);
        }
        self.index.invalidate(entity);
        Some(value)
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.values.clear();
        self.owners.clear();
        self.index.clear();
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    pub fn values(&self) -> &[C] {
        &self.values
    }

    /// Iterates `(owner, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> + '_ {
        self.owners.iter().copied().zip(self.values.iter())
    }

    /// Iterates `(owner, value)` pairs in dense order with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> + '_ {
        self.owners.iter().copied().zip(self.values.iter_mut())
    }
}

impl<C: Component> ComponentPool<C> {
    /// Appends a record for `entity`.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] for the sentinel id and
    /// [`EcsError::DuplicateComponent`] if `entity` already has a record.
    pub fn insert(&mut self, entity: EntityId, value: C) -> EcsResult<&mut C> {
        if !entity.is_valid() {
            return Err(EcsError::InvalidEntity(entity));
        }
        if self.index.contains(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: C::type_name(),
            });
        }

        let slot = self.values.len();
        self.values.push(value);
        self.owners.push(entity);
        self.index.set(entity, slot);
        Ok(&mut self.values[slot])
    }
}

impl<C> Default for ComponentPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> ComponentStorage<C> for ComponentPool<C> {
    fn with_capacity(capacity: usize) -> Self {
        ComponentPool::with_capacity(capacity)
    }

    fn insert(&mut self, entity: EntityId, value: C) -> EcsResult<&C> {
        ComponentPool::insert(self, entity, value).map(|value| &*value)
    }

    fn get(&self, entity: EntityId) -> Option<&C> {
        ComponentPool::get(self, entity)
    }

    fn contains(&self, entity: EntityId) -> bool {
        ComponentPool::contains(self, entity)
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        ComponentPool::remove(self, entity).is_some()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    fn values(&self) -> &[C] {
        &self.values
    }
}

impl<C: Component> ComponentStorageMut<C> for ComponentPool<C> {
    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        ComponentPool::get_mut(self, entity)
    }
}

impl<C: Component> ErasedPool for ComponentPool<C> {
    fn remove_entity(&mut self, entity: EntityId) {
        self.remove(entity);
    }

    fn clear_records(&mut self) {
        self.clear();
    }

    fn contains_entity(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }

    fn record_count(&self) -> usize {
        self.values.len()
    }

    fn component_name(&self) -> &'static str {
        C::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    impl Component for Health {
        type Storage = ComponentPool<Self>;
    }

    fn e(value: u32) -> EntityId {
        EntityId::from_raw(value)
    }

    /// Every owner's sparse slot must point back at it.
    fn assert_consistent(pool: &ComponentPool<Health>) {
        assert_eq!(pool.values.len(), pool.owners.len());
        for (slot, &owner) in pool.owners.iter().enumerate() {
            assert_eq!(pool.index.get(owner), Some(slot), "stale slot for {owner}");
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut pool = ComponentPool::new();
        let stored = pool.insert(e(3), Health(10)).unwrap();
        stored.0 += 1;

        assert_eq!(pool.get(e(3)), Some(&Health(11)));
        assert!(pool.contains(e(3)));
        assert!(!pool.contains(e(2)));
        assert_eq!(pool.get(e(1000)), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut pool = ComponentPool::new();
        pool.insert(e(1), Health(7)).unwrap();

        let err = pool.insert(e(1), Health(8)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { entity, .. } if entity == e(1)));
        assert_eq!(pool.get(e(1)), Some(&Health(7)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_entity_rejected() {
        let mut pool = ComponentPool::new();
        assert_eq!(
            pool.insert(EntityId::INVALID, Health(1)).unwrap_err(),
            EcsError::InvalidEntity(EntityId::INVALID)
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn test_swap_remove_relocates_last() {
        let mut pool = ComponentPool::new();
        for i in 0..4 {
            pool.insert(e(i), Health(i * 10)).unwrap();
        }

        assert_eq!(pool.remove(e(1)), Some(Health(10)));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.entities(), &[e(0), e(3), e(2)]);
        assert_eq!(pool.get(e(3)), Some(&Health(30)));
        assert!(!pool.contains(e(1)));
        assert_consistent(&pool);
    }

    #[test]
    fn test_remove_last_and_only() {
        let mut pool = ComponentPool::new();
        pool.insert(e(0), Health(1)).unwrap();
        pool.insert(e(1), Health(2)).unwrap();

        assert_eq!(pool.remove(e(1)), Some(Health(2)));
        assert_eq!(pool.remove(e(0)), Some(Health(1)));
        assert!(pool.is_empty());
        assert_consistent(&pool);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut pool = ComponentPool::new();
        pool.insert(e(0), Health(1)).unwrap();

        assert_eq!(pool.remove(e(5)), None);
        assert_eq!(pool.remove(EntityId::INVALID), None);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(e(0)), Some(&Health(1)));
    }

    #[test]
    fn test_clear_drops_every_record() {
        let mut pool = ComponentPool::new();
        for i in 0..3 {
            pool.insert(e(i), Health(i)).unwrap();
        }

        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.contains(e(1)));
        assert_eq!(pool.get(e(2)), None);

        pool.insert(e(1), Health(5)).unwrap();
        assert_eq!(pool.entities(), &[e(1)]);
        assert_consistent(&pool);
    }

    #[test]
    fn test_iter_mut_updates_in_place() {
        let mut pool = ComponentPool::new();
        pool.insert(e(4), Health(1)).unwrap();
        pool.insert(e(9), Health(2)).unwrap();

        for (_, health) in pool.iter_mut() {
            health.0 *= 100;
        }

        let seen: Vec<_> = pool.iter().map(|(id, h)| (id, h.0)).collect();
        assert_eq!(seen, vec![(e(4), 100), (e(9), 200)]);
    }

    #[test]
    fn test_erased_remove_entity() {
        let mut pool = ComponentPool::new();
        pool.insert(e(2), Health(2)).unwrap();

        let erased: &mut dyn ErasedPool = &mut pool;
        assert!(erased.contains_entity(e(2)));
        erased.remove_entity(e(2));
        erased.remove_entity(e(2));
        assert_eq!(erased.record_count(), 0);
        assert!(erased.as_any().downcast_ref::<ComponentPool<Health>>().is_some());
    }

    #[test]
    fn test_random_churn_preserves_values() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = ComponentPool::new();
        let mut expected = std::collections::HashMap::new();

        for _ in 0..3_000 {
            let id = e(rng.gen_range(0..64));
            if rng.gen_bool(0.5) {
                let value = rng.gen_range(0..1_000);
                match pool.insert(id, Health(value)) {
                    Ok(_) => assert!(expected.insert(id, value).is_none()),
                    Err(_) => assert!(expected.contains_key(&id)),
                }
            } else {
                let before = pool.len();
                let removed = pool.remove(id).map(|h| h.0);
                assert_eq!(removed, expected.remove(&id));
                let after = if removed.is_some() { before - 1 } else { before };
                assert_eq!(pool.len(), after);
            }
        }

        assert_consistent(&pool);
        for (id, value) in &expected {
            assert_eq!(pool.get(*id), Some(&Health(*value)));
        }
    }
}
