//! The entity registry.
//!
//! A [`Registry`] owns one independent universe of entities and component
//! pools. Entities are created and destroyed here; component pools are created
//! lazily the first time a kind is added and live until the registry is
//! dropped.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Registry                                                  │
//! │                                                           │
//! │  entities: EntityAllocator                                │
//! │    free list + liveness bitset                            │
//! │                                                           │
//! │  pools: HashMap<ComponentTypeId, Box<dyn ErasedPool>>     │
//! │    one pool per kind, recovered by checked downcast       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! References handed out by `get`, `view` and `filter` borrow the registry,
//! so the borrow checker rules out structural mutation while they are held.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::component::{Component, ComponentInfo, ComponentTypeId};
use crate::config::RegistryConfig;
use crate::entity::{EntityAllocator, EntityId};
use crate::error::{EcsError, EcsResult};
use crate::hierarchy::{HierarchicalPool, HierarchyNode};
use crate::query::{self, ComponentSet, ComponentSetMut, Filter};
use crate::storage::{ComponentStorage, ComponentStorageMut, ErasedPool};

/// Entity lifecycle plus a kind-indexed collection of component pools.
pub struct Registry {
    config: RegistryConfig,
    entities: EntityAllocator,
    pools: HashMap<ComponentTypeId, Box<dyn ErasedPool>>,
}

impl Registry {
    /// Create an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry sized by `config`.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entities: EntityAllocator::with_capacity(config.entity_capacity),
            pools: HashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -- Entity lifecycle --

    /// Create an entity, reusing the most recently destroyed id if any.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntitiesExhausted`] if no id is left to hand out.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        let entity = self
            .entities
            .allocate()
            .ok_or(EcsError::EntitiesExhausted)?;
        trace!(%entity, "created entity");
        Ok(entity)
    }

    /// Destroy `entity`: drop its record in every pool, then recycle the id.
    ///
    /// For hierarchical kinds this removes the entity's whole subtree from
    /// that pool; the descendants themselves stay alive.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn destroy(&mut self, entity: EntityId) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        for pool in self.pools.values_mut() {
            pool.remove_entity(entity);
        }
        self.entities.free(entity);
        debug!(%entity, alive = self.entities.alive_count(), "destroyed entity");
        Ok(())
    }

    /// Destroy `root` and every entity below it in the `N` hierarchy.
    ///
    /// Returns the destroyed entities in depth-first order. If `root` has no
    /// `N` node only `root` itself is destroyed.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `root` is not alive.
    pub fn destroy_recursive<N>(&mut self, root: EntityId) -> EcsResult<Vec<EntityId>>
    where
        N: Component<Storage = HierarchicalPool<N>> + HierarchyNode,
    {
        self.ensure_alive(root)?;
        let subtree = self
            .storage::<N>()
            .and_then(|pool| pool.subtree(root))
            .map_or_else(|| vec![root], <[EntityId]>::to_vec);

        let mut destroyed = Vec::with_capacity(subtree.len());
        for entity in subtree {
            if self.is_alive(entity) {
                self.destroy(entity)?;
                destroyed.push(entity);
            }
        }
        Ok(destroyed)
    }

    /// Destroy every alive entity. Pools stay registered.
    ///
    /// Returns the number of entities destroyed.
    pub fn clear(&mut self) -> usize {
        let alive: Vec<EntityId> = self.entities.iter_alive().collect();
        for pool in self.pools.values_mut() {
            pool.clear_records();
        }
        for &entity in &alive {
            self.entities.free(entity);
        }
        debug!(destroyed = alive.len(), "cleared registry");
        alive.len()
    }

    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Iterates alive entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter_alive()
    }

    // -- Component operations --

    /// Attach `value` to `entity`, creating the pool for `C` on first use.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if `entity` is not alive.
    /// - [`EcsError::DuplicateComponent`] if `entity` already has a `C`.
    /// - Hierarchical kinds also report [`EcsError::SelfParent`] and
    ///   [`EcsError::MissingParent`].
    pub fn add<C: Component>(&mut self, entity: EntityId, value: C) -> EcsResult<&C> {
        self.ensure_alive(entity)?;
        self.storage_or_insert::<C>()?.insert(entity, value)
    }

    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive and
    /// [`EcsError::MissingComponent`] if it has no `C`.
    pub fn get<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        self.ensure_alive(entity)?;
        self.storage::<C>()
            .and_then(|pool| pool.get(entity))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: C::type_name(),
            })
    }

    /// Mutable access to `entity`'s `C`.
    ///
    /// Only kinds whose pool is [`ComponentStorageMut`] can be edited in
    /// place. Hierarchy nodes are re-linked through
    /// [`Registry::set_parent`] instead:
    ///
    /// ```compile_fail
    /// use engine_component::{Registry, SceneNode};
    ///
    /// let mut registry = Registry::new();
    /// let e = registry.create().unwrap();
    /// registry.add(e, SceneNode::root()).unwrap();
    /// let _node = registry.get_mut::<SceneNode>(e);
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get`].
    pub fn get_mut<C>(&mut self, entity: EntityId) -> EcsResult<&mut C>
    where
        C: Component,
        C::Storage: ComponentStorageMut<C>,
    {
        self.ensure_alive(entity)?;
        self.storage_mut::<C>()
            .and_then(|pool| pool.get_mut(entity))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: C::type_name(),
            })
    }

    /// Returns `true` if `entity` is alive and has a `C`.
    #[must_use]
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        self.is_alive(entity) && self.storage::<C>().is_some_and(|pool| pool.contains(entity))
    }

    /// Move `entity`'s subtree in the `N` hierarchy under `parent`, or to the
    /// top level when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if `entity` or `parent` is not alive.
    /// - [`EcsError::MissingComponent`] if `entity` has no `N` node.
    /// - [`EcsError::SelfParent`], [`EcsError::MissingParent`] and
    ///   [`EcsError::HierarchyCycle`] as for
    ///   [`HierarchicalPool::set_parent`].
    pub fn set_parent<N>(&mut self, entity: EntityId, parent: Option<EntityId>) -> EcsResult<()>
    where
        N: Component<Storage = HierarchicalPool<N>> + HierarchyNode,
    {
        self.ensure_alive(entity)?;
        if let Some(parent) = parent {
            self.ensure_alive(parent)?;
        }
        self.storage_mut::<N>()
            .ok_or(EcsError::MissingComponent {
                entity,
                component: N::type_name(),
            })?
            .set_parent(entity, parent)
    }

    /// Detach `entity`'s `C`. Returns `Ok(false)` if it had none.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn remove<C: Component>(&mut self, entity: EntityId) -> EcsResult<bool> {
        self.ensure_alive(entity)?;
        Ok(self
            .storage_mut::<C>()
            .is_some_and(|pool| pool.remove(entity)))
    }

    /// The pool for `C`, if one has been created.
    #[must_use]
    pub fn storage<C: Component>(&self) -> Option<&C::Storage> {
        self.pools
            .get(&C::component_type_id())?
            .as_any()
            .downcast_ref::<C::Storage>()
    }

    /// Mutable access to the pool for `C`.
    ///
    /// Inserting through this bypasses the liveness check that
    /// [`Registry::add`] performs.
    #[must_use]
    pub fn storage_mut<C: Component>(&mut self) -> Option<&mut C::Storage> {
        self.pools
            .get_mut(&C::component_type_id())?
            .as_any_mut()
            .downcast_mut::<C::Storage>()
    }

    /// Describes every registered pool, sorted by component name.
    #[must_use]
    pub fn component_infos(&self) -> Vec<ComponentInfo> {
        let mut infos: Vec<ComponentInfo> = self
            .pools
            .iter()
            .map(|(&type_id, pool)| ComponentInfo {
                type_id,
                name: pool.component_name(),
                len: pool.record_count(),
                hierarchical: pool.is_hierarchical(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(b.name));
        infos
    }

    // -- Views and filters --

    /// Shared references to `entity`'s records of every kind in `Q`.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive and
    /// [`EcsError::MissingComponent`] naming the first absent kind.
    pub fn view<Q: ComponentSet>(&self, entity: EntityId) -> EcsResult<Q::Item<'_>> {
        self.ensure_alive(entity)?;
        Q::pools(self)
            .and_then(|pools| Q::fetch(pools, entity))
            .ok_or_else(|| self.missing::<Q>(entity))
    }

    /// Mutable references to `entity`'s records of every kind in `Q`.
    ///
    /// # Errors
    ///
    /// As [`Registry::view`], plus [`EcsError::AliasedComponent`] if `Q`
    /// names a kind twice.
    ///
    /// Sets containing a hierarchy node are not [`ComponentSetMut`]:
    ///
    /// ```compile_fail
    /// use engine_component::{Registry, SceneNode};
    ///
    /// let mut registry = Registry::new();
    /// let e = registry.create().unwrap();
    /// registry.add(e, SceneNode::root()).unwrap();
    /// let _view = registry.view_mut::<(SceneNode,)>(e);
    /// ```
    pub fn view_mut<Q: ComponentSetMut>(&mut self, entity: EntityId) -> EcsResult<Q::ItemMut<'_>> {
        self.ensure_alive(entity)?;
        if let Some(name) = query::first_aliased::<Q>() {
            return Err(EcsError::AliasedComponent(name));
        }
        if Q::pools(self).and_then(|pools| Q::fetch(pools, entity)).is_none() {
            return Err(self.missing::<Q>(entity));
        }
        Q::pools_mut(self)
            .and_then(|pools| Q::into_item_mut(pools, entity))
            .ok_or_else(|| {
                EcsError::InvariantViolation(format!("pools for {entity} vanished mid-view"))
            })
    }

    /// Every entity holding all kinds in `Q`.
    #[must_use]
    pub fn filter<Q: ComponentSet>(&self) -> Filter<'_, Q> {
        Filter::new(Q::pools(self))
    }

    /// Run `f` with mutable references for every entity matching `Q`.
    ///
    /// Candidates are snapshotted from the smallest pool before the pass;
    /// membership of each is re-checked when its turn comes. Returns how many
    /// entities `f` was called for.
    ///
    /// # Errors
    ///
    /// [`EcsError::AliasedComponent`] if `Q` names a kind twice.
    pub fn for_each_mut<Q, F>(&mut self, mut f: F) -> EcsResult<usize>
    where
        Q: ComponentSetMut,
        F: FnMut(EntityId, Q::ItemMut<'_>),
    {
        if let Some(name) = query::first_aliased::<Q>() {
            return Err(EcsError::AliasedComponent(name));
        }
        let candidates = match Q::pools(self) {
            Some(pools) => Q::driver(pools).to_vec(),
            None => return Ok(0),
        };
        let Some(mut pools) = Q::pools_mut(self) else {
            return Ok(0);
        };

        let mut visited = 0;
        for entity in candidates {
            if let Some(item) = Q::fetch_mut(&mut pools, entity) {
                f(entity, item);
                visited += 1;
            }
        }
        Ok(visited)
    }

    // -- Internals --

    fn ensure_alive(&self, entity: EntityId) -> EcsResult<()> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    fn storage_or_insert<C: Component>(&mut self) -> EcsResult<&mut C::Storage> {
        let capacity = self.config.pool_capacity;
        let pool = self
            .pools
            .entry(C::component_type_id())
            .or_insert_with(|| -> Box<dyn ErasedPool> {
                debug!(component = C::type_name(), capacity, "registered component pool");
                Box::new(<C::Storage as ComponentStorage<C>>::with_capacity(capacity))
            });
        pool.as_any_mut()
            .downcast_mut::<C::Storage>()
            .ok_or(EcsError::TagCollision(C::type_name()))
    }

    /// Exclusive borrows of several distinct pools at once.
    pub(crate) fn disjoint_pools_mut<const N: usize>(
        &mut self,
        keys: [ComponentTypeId; N],
    ) -> Option<[&mut Box<dyn ErasedPool>; N]> {
        let distinct = keys
            .iter()
            .enumerate()
            .all(|(i, key)| !keys[..i].contains(key));
        if !distinct {
            return None;
        }
        let found: Vec<&mut Box<dyn ErasedPool>> = self
            .pools
            .get_disjoint_mut(keys.each_ref())
            .into_iter()
            .collect::<Option<_>>()?;
        found.try_into().ok()
    }

    /// Error naming the first kind in `Q` that `entity` lacks.
    fn missing<Q: ComponentSet>(&self, entity: EntityId) -> EcsError {
        Q::kinds()
            .into_iter()
            .find(|(type_id, _)| {
                !self
                    .pools
                    .get(type_id)
                    .is_some_and(|pool| pool.contains_entity(entity))
            })
            .map_or_else(
                || EcsError::TagCollision(Q::kinds()[0].1),
                |(_, component)| EcsError::MissingComponent { entity, component },
            )
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("alive", &self.entities.alive_count())
            .field("components", &self.component_infos())
            .finish()
    }
}
