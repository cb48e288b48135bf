//! Multi-component access: views and filters.
//!
//! A [`ComponentSet`] is a tuple of component kinds such as `(Position,
//! Velocity)`. It knows how to borrow the matching pools out of a
//! [`Registry`] and pull one entity's records out of them, all or nothing.
//!
//! - [`Registry::view`] / [`Registry::view_mut`] fetch the records of a single
//!   entity. Mutable access needs [`ComponentSetMut`], which only sets made
//!   of editable kinds implement; hierarchy nodes stay read-only.
//! - [`Registry::filter`] returns a [`Filter`], a restartable lazy sequence of
//!   every entity holding all kinds in the set.
//!
//! ## Driver Selection
//!
//! A filter walks the dense owner array of the smallest requested pool and
//! probes the others for each candidate, so a pass costs
//! O(min pool size × kinds). Matches come out in the driver's dense order.
//!
//! ```text
//! Position: [e0 e1 e2 e3 e4 e5]
//! Velocity: [e4 e1]              <- driver
//! yields:   e4, e1
//! ```

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;
use crate::registry::Registry;
use crate::storage::{ComponentStorage, ComponentStorageMut, ErasedPool};

/// A tuple of component kinds accessed together.
///
/// Implemented for tuples of one to eight [`Component`] types.
pub trait ComponentSet: 'static {
    /// Shared borrows of every pool in the set.
    type Pools<'r>: Copy;
    /// Shared borrows of one entity's records.
    type Item<'r>;

    /// Tag and name of every kind, in tuple order.
    fn kinds() -> Vec<(ComponentTypeId, &'static str)>;

    /// Borrows every pool, or `None` if any kind has no pool yet.
    fn pools(registry: &Registry) -> Option<Self::Pools<'_>>;

    /// Owner array of the smallest pool.
    fn driver<'r>(pools: Self::Pools<'r>) -> &'r [EntityId];

    /// `entity`'s records, or `None` if it lacks any kind.
    fn fetch<'r>(pools: Self::Pools<'r>, entity: EntityId) -> Option<Self::Item<'r>>;
}

/// A [`ComponentSet`] whose kinds can all be edited in place.
pub trait ComponentSetMut: ComponentSet {
    /// Exclusive borrows of every pool in the set.
    type PoolsMut<'r>;
    /// Exclusive borrows of one entity's records.
    type ItemMut<'r>;

    /// Exclusively borrows every pool. Kinds must be distinct.
    fn pools_mut(registry: &mut Registry) -> Option<Self::PoolsMut<'_>>;

    /// Reborrows `entity`'s records out of already borrowed pools.
    fn fetch_mut<'a>(pools: &'a mut Self::PoolsMut<'_>, entity: EntityId)
    -> Option<Self::ItemMut<'a>>;

    /// Consumes the pool borrows into `entity`'s records.
    fn into_item_mut<'r>(pools: Self::PoolsMut<'r>, entity: EntityId)
    -> Option<Self::ItemMut<'r>>;
}

macro_rules! impl_component_set {
    ($(($T:ident, $p:ident)),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {
            type Pools<'r> = ($(&'r $T::Storage,)+);
            type Item<'r> = ($(&'r $T,)+);

            fn kinds() -> Vec<(ComponentTypeId, &'static str)> {
                vec![$(($T::component_type_id(), $T::type_name())),+]
            }

            fn pools(registry: &Registry) -> Option<Self::Pools<'_>> {
                Some(($(registry.storage::<$T>()?,)+))
            }

            fn driver<'r>(pools: Self::Pools<'r>) -> &'r [EntityId] {
                let ($($p,)+) = pools;
                [$($p.entities()),+]
                    .into_iter()
                    .min_by_key(|owners| owners.len())
                    .unwrap_or(&[])
            }

            fn fetch<'r>(pools: Self::Pools<'r>, entity: EntityId) -> Option<Self::Item<'r>> {
                let ($($p,)+) = pools;
                Some(($($p.get(entity)?,)+))
            }
        }

        impl<$($T: Component),+> ComponentSetMut for ($($T,)+)
        where
            $($T::Storage: ComponentStorageMut<$T>),+
        {
            type PoolsMut<'r> = ($(&'r mut $T::Storage,)+);
            type ItemMut<'r> = ($(&'r mut $T,)+);

            fn pools_mut(registry: &mut Registry) -> Option<Self::PoolsMut<'_>> {
                let [$($p),+] = registry.disjoint_pools_mut([$($T::component_type_id()),+])?;
                Some(($($p.as_any_mut().downcast_mut::<$T::Storage>()?,)+))
            }

            fn fetch_mut<'a>(
                pools: &'a mut Self::PoolsMut<'_>,
                entity: EntityId,
            ) -> Option<Self::ItemMut<'a>> {
                let ($($p,)+) = pools;
                Some(($($p.get_mut(entity)?,)+))
            }

            fn into_item_mut<'r>(
                pools: Self::PoolsMut<'r>,
                entity: EntityId,
            ) -> Option<Self::ItemMut<'r>> {
                let ($($p,)+) = pools;
                Some(($($p.get_mut(entity)?,)+))
            }
        }
    };
}

impl_component_set!((A, a));
impl_component_set!((A, a), (B, b));
impl_component_set!((A, a), (B, b), (C, c));
impl_component_set!((A, a), (B, b), (C, c), (D, d));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g));
impl_component_set!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g), (H, h));

/// A lazy, restartable sequence of entities holding every kind in `Q`.
///
/// Each call to [`Filter::iter`] starts a fresh pass over the driver pool.
/// Membership in the other pools is probed per candidate on every pass.
pub struct Filter<'r, Q: ComponentSet> {
    pools: Option<Q::Pools<'r>>,
}

impl<'r, Q: ComponentSet> Filter<'r, Q> {
    pub(crate) fn new(pools: Option<Q::Pools<'r>>) -> Self {
        Self { pools }
    }

    /// Starts a pass yielding `(entity, records)` pairs.
    #[must_use]
    pub fn iter(&self) -> FilterIter<'r, Q> {
        FilterIter {
            pools: self.pools,
            driver: self.pools.map(Q::driver).unwrap_or(&[]),
            cursor: 0,
        }
    }

    /// Starts a pass yielding only the matching entities.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + use<'r, Q> {
        self.iter().map(|(entity, _)| entity)
    }

    /// Number of candidates a pass will probe.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.pools.map_or(0, |pools| Q::driver(pools).len())
    }

    /// Returns `true` if a pass yields nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<Q: ComponentSet> Clone for Filter<'_, Q> {
    fn clone(&self) -> Self {
        Self { pools: self.pools }
    }
}

impl<'r, Q: ComponentSet> IntoIterator for &Filter<'r, Q> {
    type Item = (EntityId, Q::Item<'r>);
    type IntoIter = FilterIter<'r, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'r, Q: ComponentSet> IntoIterator for Filter<'r, Q> {
    type Item = (EntityId, Q::Item<'r>);
    type IntoIter = FilterIter<'r, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass of a [`Filter`].
pub struct FilterIter<'r, Q: ComponentSet> {
    pools: Option<Q::Pools<'r>>,
    driver: &'r [EntityId],
    cursor: usize,
}

impl<'r, Q: ComponentSet> Iterator for FilterIter<'r, Q> {
    type Item = (EntityId, Q::Item<'r>);

    fn next(&mut self) -> Option<Self::Item> {
        let pools = self.pools?;
        while let Some(&entity) = self.driver.get(self.cursor) {
            self.cursor += 1;
            if let Some(item) = Q::fetch(pools, entity) {
                return Some((entity, item));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.driver.len().saturating_sub(self.cursor)))
    }
}

/// Returns the name of the first kind in `Q` that appears twice.
pub(crate) fn first_aliased<Q: ComponentSet>() -> Option<&'static str> {
    let kinds = Q::kinds();
    kinds
        .iter()
        .enumerate()
        .find(|(i, (id, _))| kinds[..*i].iter().any(|(other, _)| other == id))
        .map(|(_, (_, name))| *name)
}
