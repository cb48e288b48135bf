//! Hierarchical storage for scene-graph nodes.
//!
//! [`HierarchicalPool`] has the same dense/sparse shape as
//! [`ComponentPool`](crate::ComponentPool) but keeps a stronger ordering: the
//! dense arrays are always a pre-order depth-first flattening of the node
//! forest, so every node's subtree is one contiguous slot range.
//!
//! ```text
//! add(root)                 [root]
//! add(a, parent = root)     [root, a]
//! add(b, parent = root)     [root, b, a]
//! add(c, parent = a)        [root, b, a, c]
//! remove(a)                 [root, b]
//! ```
//!
//! A child is inserted directly after its parent, ahead of the parent's
//! existing children. Forward traversal therefore meets siblings in reverse
//! order of addition. Renderers and transform propagation walk the arrays
//! front to back and rely on parents preceding their descendants.
//!
//! Insertion and removal shift and renumber every trailing record, so both
//! cost O(subtree + trailing records). There is no O(1) path.

use std::any::Any;

use tracing::trace;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{EcsError, EcsResult};
use crate::sparse::SparseIndex;
use crate::storage::{ComponentStorage, ErasedPool};

/// A record that links an entity into the scene hierarchy.
pub trait HierarchyNode {
    /// The parent entity, or `None` for a root.
    fn parent(&self) -> Option<EntityId>;

    /// Overwrites the parent link.
    ///
    /// Stored nodes are never handed out mutably, so on a stored node this is
    /// only reached through [`HierarchicalPool::set_parent`], which moves the
    /// subtree to match.
    fn set_parent(&mut self, parent: Option<EntityId>);
}

/// The stock hierarchy node: a bare parent link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneNode {
    parent: Option<EntityId>,
}

impl SceneNode {
    /// A node with no parent.
    #[must_use]
    pub const fn root() -> Self {
        Self { parent: None }
    }

    /// A node attached under `parent`.
    #[must_use]
    pub const fn child_of(parent: EntityId) -> Self {
        Self {
            parent: Some(parent),
        }
    }
}

impl HierarchyNode for SceneNode {
    fn parent(&self) -> Option<EntityId> {
        self.parent.filter(|p| p.is_valid())
    }

    fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }
}

impl Component for SceneNode {
    type Storage = HierarchicalPool<Self>;

    fn type_name() -> &'static str {
        "SceneNode"
    }
}

/// Dense pool whose layout is a depth-first flattening of the hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchicalPool<C> {
    nodes: Vec<C>,
    owners: Vec<EntityId>,
    index: SparseIndex,
}

impl<C> HierarchicalPool<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            index: SparseIndex::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains(entity)
    }

    /// Dense slot currently holding `entity`'s node.
    #[must_use]
    pub fn slot_of(&self, entity: EntityId) -> Option<usize> {
        self.index.get(entity)
    }

    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.index.get(entity).map(|slot| &self.nodes[slot])
    }

    /// Owners in depth-first order.
    pub fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    /// Nodes in depth-first order.
    pub fn values(&self) -> &[C] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> + '_ {
        self.owners.iter().copied().zip(self.nodes.iter())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.owners.clear();
        self.index.clear();
    }

    fn reindex_from(&mut self, start: usize) {
        for (slot, &owner) in self.owners.iter().enumerate().skip(start) {
            self.index.set(owner, slot);
        }
    }
}

impl<C: HierarchyNode> HierarchicalPool<C> {
    /// First slot past the last descendant of the node at `slot`.
    ///
    /// A record belongs to the subtree exactly when its parent sits inside
    /// the range scanned so far.
    fn bound_at(&self, slot: usize) -> usize {
        let mut end = slot + 1;
        while end < self.nodes.len() {
            let inside = self.nodes[end]
                .parent()
                .and_then(|parent| self.index.get(parent))
                .is_some_and(|p| p >= slot && p < end);
            if !inside {
                break;
            }
            end += 1;
        }
        end
    }

    /// Exclusive end of `entity`'s subtree range.
    #[must_use]
    pub fn subtree_bound(&self, entity: EntityId) -> Option<usize> {
        self.index.get(entity).map(|slot| self.bound_at(slot))
    }

    /// `entity` followed by all of its descendants, in depth-first order.
    #[must_use]
    pub fn subtree(&self, entity: EntityId) -> Option<&[EntityId]> {
        let slot = self.index.get(entity)?;
        Some(&self.owners[slot..self.bound_at(slot)])
    }

    #[must_use]
    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.get(entity).and_then(HierarchyNode::parent)
    }

    /// Direct children of `entity` in dense order (newest first).
    pub fn children(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        let (mut cursor, end) = match self.index.get(entity) {
            Some(slot) => (slot + 1, self.bound_at(slot)),
            None => (0, 0),
        };
        std::iter::from_fn(move || {
            if cursor >= end {
                return None;
            }
            let child = self.owners[cursor];
            cursor = self.bound_at(cursor);
            Some(child)
        })
    }

    /// Top-level nodes in dense order (oldest first).
    pub fn roots(&self) -> impl Iterator<Item = EntityId> + '_ {
        let mut cursor = 0;
        std::iter::from_fn(move || {
            if cursor >= self.owners.len() {
                return None;
            }
            let root = self.owners[cursor];
            cursor = self.bound_at(cursor);
            Some(root)
        })
    }

    /// Number of ancestors above `entity`; roots have depth 0.
    #[must_use]
    pub fn depth(&self, entity: EntityId) -> Option<usize> {
        let mut node = self.get(entity)?;
        let mut depth = 0;
        while let Some(parent) = node.parent() {
            node = self.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Verifies the sparse table and the contiguous-subtree layout.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvariantViolation`] describing the first broken record.
    pub fn check_layout(&self) -> EcsResult<()> {
        let violation = |msg: String| Err(EcsError::InvariantViolation(msg));

        if self.nodes.len() != self.owners.len() {
            return violation(format!(
                "{} nodes but {} owners",
                self.nodes.len(),
                self.owners.len()
            ));
        }
        for (slot, &owner) in self.owners.iter().enumerate() {
            if self.index.get(owner) != Some(slot) {
                return violation(format!("sparse slot of {owner} does not point at {slot}"));
            }
            let Some(parent) = self.nodes[slot].parent() else {
                continue;
            };
            if parent == owner {
                return violation(format!("{owner} is its own parent"));
            }
            let Some(parent_slot) = self.index.get(parent) else {
                return violation(format!("{owner} references absent parent {parent}"));
            };
            if parent_slot >= slot {
                return violation(format!("{owner} at {slot} precedes its parent {parent}"));
            }
            if slot >= self.bound_at(parent_slot) {
                return violation(format!("{owner} lies outside the subtree of {parent}"));
            }
        }
        Ok(())
    }
}

impl<C: Component + HierarchyNode> HierarchicalPool<C> {
    /// Inserts `node` for `entity`.
    ///
    /// Roots go to the tail. Children go directly after their parent, which
    /// shifts and renumbers every record from that slot onward.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] for the sentinel id.
    /// - [`EcsError::DuplicateComponent`] if `entity` already has a node.
    /// - [`EcsError::SelfParent`] if `node` names `entity` as its parent.
    /// - [`EcsError::MissingParent`] if the parent has no node yet.
    pub fn insert(&mut self, entity: EntityId, node: C) -> EcsResult<&C> {
        if !entity.is_valid() {
            return Err(EcsError::InvalidEntity(entity));
        }
        if self.index.contains(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: C::type_name(),
            });
        }

        let slot = match node.parent() {
            None => self.nodes.len(),
            Some(parent) if parent == entity => return Err(EcsError::SelfParent(entity)),
            Some(parent) => {
                self.index
                    .get(parent)
                    .ok_or(EcsError::MissingParent { entity, parent })?
                    + 1
            }
        };

        self.nodes.insert(slot, node);
        self.owners.insert(slot, entity);
        self.reindex_from(slot);
        trace!(%entity, slot, "inserted hierarchy node");
        Ok(&self.nodes[slot])
    }

    /// Removes `entity` and its whole subtree as one contiguous block.
    ///
    /// Returns the removed owners in depth-first order.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has no node.
    pub fn remove(&mut self, entity: EntityId) -> EcsResult<Vec<EntityId>> {
        let slot = self.index.get(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: C::type_name(),
        })?;
        let bound = self.bound_at(slot);

        self.nodes.drain(slot..bound);
        let removed: Vec<EntityId> = self.owners.drain(slot..bound).collect();
        for &owner in &removed {
            self.index.invalidate(owner);
        }
        self.reindex_from(slot);

        trace!(%entity, removed = removed.len(), "removed hierarchy subtree");
        Ok(removed)
    }

    /// Moves `entity`'s subtree under `new_parent`, or to the top level when
    /// `new_parent` is `None`.
    ///
    /// The subtree keeps its internal order and lands where a fresh insert
    /// would: directly after the new parent, or at the tail.
    ///
    /// # Errors
    ///
    /// - [`EcsError::MissingComponent`] if `entity` has no node.
    /// - [`EcsError::SelfParent`] if `new_parent` is `entity`.
    /// - [`EcsError::MissingParent`] if `new_parent` has no node.
    /// - [`EcsError::HierarchyCycle`] if `new_parent` is a descendant of
    ///   `entity`.
    pub fn set_parent(&mut self, entity: EntityId, new_parent: Option<EntityId>) -> EcsResult<()> {
        let slot = self.index.get(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: C::type_name(),
        })?;
        let bound = self.bound_at(slot);

        let parent_slot = match new_parent {
            None => None,
            Some(parent) if parent == entity => return Err(EcsError::SelfParent(entity)),
            Some(parent) => {
                let parent_slot = self
                    .index
                    .get(parent)
                    .ok_or(EcsError::MissingParent { entity, parent })?;
                if (slot..bound).contains(&parent_slot) {
                    return Err(EcsError::HierarchyCycle { entity, parent });
                }
                Some(parent_slot)
            }
        };

        let mut block: Vec<C> = self.nodes.drain(slot..bound).collect();
        let block_owners: Vec<EntityId> = self.owners.drain(slot..bound).collect();
        block[0].set_parent(new_parent);

        let at = match parent_slot {
            None => self.nodes.len(),
            Some(p) if p >= bound => p - (bound - slot) + 1,
            Some(p) => p + 1,
        };
        self.nodes.splice(at..at, block);
        self.owners.splice(at..at, block_owners);
        self.reindex_from(slot.min(at));

        trace!(%entity, parent = ?new_parent, from = slot, to = at, "moved hierarchy subtree");
        Ok(())
    }
}

impl<C> Default for HierarchicalPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component + HierarchyNode> ComponentStorage<C> for HierarchicalPool<C> {
    fn with_capacity(capacity: usize) -> Self {
        HierarchicalPool::with_capacity(capacity)
    }

    fn insert(&mut self, entity: EntityId, value: C) -> EcsResult<&C> {
        HierarchicalPool::insert(self, entity, value)
    }

    fn get(&self, entity: EntityId) -> Option<&C> {
        HierarchicalPool::get(self, entity)
    }

    fn contains(&self, entity: EntityId) -> bool {
        HierarchicalPool::contains(self, entity)
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        HierarchicalPool::remove(self, entity).is_ok()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    fn values(&self) -> &[C] {
        &self.nodes
    }
}

impl<C: Component + HierarchyNode> ErasedPool for HierarchicalPool<C> {
    fn remove_entity(&mut self, entity: EntityId) {
        let _ = self.remove(entity);
    }

    fn clear_records(&mut self) {
        self.clear();
    }

    fn contains_entity(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }

    fn record_count(&self) -> usize {
        self.nodes.len()
    }

    fn component_name(&self) -> &'static str {
        C::type_name()
    }

    fn is_hierarchical(&self) -> bool {
        true
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

    fn e(value: u32) -> EntityId {
        EntityId::from_raw(value)
    }

    fn pool_with(edges: &[(u32, Option<u32>)]) -> HierarchicalPool<SceneNode> {
        let mut pool = HierarchicalPool::new();
        for &(id, parent) in edges {
            let node = match parent {
                Some(p) => SceneNode::child_of(e(p)),
                None => SceneNode::root(),
            };
            pool.insert(e(id), node).unwrap();
            pool.check_layout().unwrap();
        }
        pool
    }

    fn order(pool: &HierarchicalPool<SceneNode>) -> Vec<u32> {
        pool.entities().iter().map(|id| id.value()).collect()
    }

    #[test]
    fn test_children_precede_older_siblings() {
        let pool = pool_with(&[(0, None), (1, Some(0)), (2, Some(0))]);
        assert_eq!(order(&pool), vec![0, 2, 1]);
        assert_eq!(pool.children(e(0)).collect::<Vec<_>>(), vec![e(2), e(1)]);
    }

    #[test]
    fn test_remove_root_empties_pool() {
        let mut pool = pool_with(&[(0, None), (1, Some(0)), (2, Some(0))]);
        let removed = pool.remove(e(0)).unwrap();

        assert_eq!(removed, vec![e(0), e(2), e(1)]);
        assert!(pool.is_empty());
        assert!(!pool.contains(e(1)));
        assert!(!pool.contains(e(2)));
    }

    #[test]
    fn test_grandchild_lands_inside_parent_range() {
        // root(0) -> a(1) -> c(3); root -> b(2); second root 4.
        let pool = pool_with(&[(0, None), (4, None), (1, Some(0)), (2, Some(0)), (3, Some(1))]);
        assert_eq!(order(&pool), vec![0, 2, 1, 3, 4]);
        assert_eq!(pool.subtree(e(0)).unwrap(), &[e(0), e(2), e(1), e(3)]);
        assert_eq!(pool.subtree(e(1)).unwrap(), &[e(1), e(3)]);
        assert_eq!(pool.subtree_bound(e(2)), Some(2));
        assert_eq!(pool.roots().collect::<Vec<_>>(), vec![e(0), e(4)]);
        assert_eq!(pool.depth(e(3)), Some(2));
        assert_eq!(pool.parent_of(e(3)), Some(e(1)));
        assert_eq!(pool.parent_of(e(4)), None);
    }

    #[test]
    fn test_remove_inner_subtree_renumbers_tail() {
        let mut pool = pool_with(&[(0, None), (1, Some(0)), (2, Some(1)), (3, Some(0)), (5, None)]);
        assert_eq!(order(&pool), vec![0, 3, 1, 2, 5]);

        assert_eq!(pool.remove(e(1)).unwrap(), vec![e(1), e(2)]);
        assert_eq!(order(&pool), vec![0, 3, 5]);
        assert_eq!(pool.slot_of(e(5)), Some(2));
        assert!(pool.get(e(2)).is_none());
        pool.check_layout().unwrap();
    }

    #[test]
    fn test_insert_rejections_leave_pool_untouched() {
        let mut pool = pool_with(&[(0, None)]);

        assert_eq!(
            pool.insert(e(1), SceneNode::child_of(e(1))).unwrap_err(),
            EcsError::SelfParent(e(1))
        );
        assert_eq!(
            pool.insert(e(1), SceneNode::child_of(e(9))).unwrap_err(),
            EcsError::MissingParent {
                entity: e(1),
                parent: e(9)
            }
        );
        assert!(matches!(
            pool.insert(e(0), SceneNode::root()),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(
            pool.insert(EntityId::INVALID, SceneNode::root()).unwrap_err(),
            EcsError::InvalidEntity(EntityId::INVALID)
        );
        assert_eq!(order(&pool), vec![0]);
    }

    #[test]
    fn test_clear_then_rebuild() {
        let mut pool = pool_with(&[(0, None), (1, Some(0)), (2, Some(1))]);
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.slot_of(e(1)), None);
        assert_eq!(pool.roots().count(), 0);

        pool.insert(e(2), SceneNode::root()).unwrap();
        assert!(matches!(
            pool.insert(e(3), SceneNode::child_of(e(0))),
            Err(EcsError::MissingParent { .. })
        ));
        assert_eq!(order(&pool), vec![2]);
        pool.check_layout().unwrap();
    }

    #[test]
    fn test_remove_absent_fails() {
        let mut pool = pool_with(&[(0, None)]);
        assert!(matches!(
            pool.remove(e(3)),
            Err(EcsError::MissingComponent { entity, .. }) if entity == e(3)
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_parent_link_is_root() {
        let mut pool = HierarchicalPool::new();
        pool.insert(e(0), SceneNode::root()).unwrap();
        pool.insert(e(1), SceneNode::child_of(EntityId::INVALID)).unwrap();
        assert_eq!(order(&pool), vec![0, 1]);
        assert_eq!(pool.roots().count(), 2);
    }

    #[test]
    fn test_set_parent_moves_whole_subtree() {
        let mut pool = pool_with(&[(0, None), (1, None), (2, Some(0)), (3, Some(2)), (4, Some(1))]);
        assert_eq!(order(&pool), vec![0, 2, 3, 1, 4]);

        pool.set_parent(e(2), Some(e(4))).unwrap();
        assert_eq!(order(&pool), vec![0, 1, 4, 2, 3]);
        assert_eq!(pool.parent_of(e(2)), Some(e(4)));
        pool.check_layout().unwrap();

        pool.set_parent(e(4), None).unwrap();
        assert_eq!(order(&pool), vec![0, 1, 4, 2, 3]);
        assert_eq!(pool.roots().collect::<Vec<_>>(), vec![e(0), e(1), e(4)]);
        pool.check_layout().unwrap();

        pool.set_parent(e(4), Some(e(0))).unwrap();
        assert_eq!(order(&pool), vec![0, 4, 2, 3, 1]);
        pool.check_layout().unwrap();
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut pool = pool_with(&[(0, None), (1, Some(0)), (2, Some(1))]);

        assert_eq!(
            pool.set_parent(e(0), Some(e(2))).unwrap_err(),
            EcsError::HierarchyCycle {
                entity: e(0),
                parent: e(2)
            }
        );
        assert_eq!(pool.set_parent(e(1), Some(e(1))).unwrap_err(), EcsError::SelfParent(e(1)));
        assert!(matches!(
            pool.set_parent(e(7), None),
            Err(EcsError::MissingComponent { .. })
        ));
        assert_eq!(order(&pool), vec![0, 1, 2]);
    }

    #[test]
    fn test_check_layout_detects_tampered_parent() {
        let mut pool = pool_with(&[(0, None), (1, None), (2, Some(0))]);
        let slot = pool.slot_of(e(2)).unwrap();
        pool.nodes[slot].set_parent(Some(e(1)));
        assert!(matches!(
            pool.check_layout(),
            Err(EcsError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_random_operations_keep_subtrees_contiguous() {
        let mut rng = StdRng::seed_from_u64(0xdead_beef);
        let mut pool: HierarchicalPool<SceneNode> = HierarchicalPool::new();

        for step in 0..1_500 {
            let id = e(rng.gen_range(0..48));
            let present = pool.entities().to_vec();
            match rng.gen_range(0..10) {
                0..=5 => {
                    let node = if present.is_empty() || rng.gen_bool(0.25) {
                        SceneNode::root()
                    } else {
                        SceneNode::child_of(present[rng.gen_range(0..present.len())])
                    };
                    let _ = pool.insert(id, node);
                }
                6..=8 => {
                    if let Ok(removed) = pool.remove(id) {
                        // Removal is total: nothing left points at a removed node.
                        for (_, node) in pool.iter() {
                            if let Some(parent) = node.parent() {
                                assert!(!removed.contains(&parent), "dangling parent at step {step}");
                            }
                        }
                    }
                }
                _ => {
                    let parent = if present.is_empty() || rng.gen_bool(0.3) {
                        None
                    } else {
                        Some(present[rng.gen_range(0..present.len())])
                    };
                    let _ = pool.set_parent(id, parent);
                }
            }
            pool.check_layout()
                .unwrap_or_else(|err| panic!("step {step}: {err}"));
        }
    }
}
