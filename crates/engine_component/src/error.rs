//! Storage-layer error types.

use crate::entity::EntityId;

/// Convenience alias for results produced by this crate.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors reported by pools and the registry.
///
/// Every failure is a final, synchronous answer: nothing is retried and the
/// storage is left exactly as it was before the failing call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity is the invalid sentinel or is not currently alive.
    #[error("{0} is invalid or not alive")]
    InvalidEntity(EntityId),

    /// Every entity value below the invalid sentinel is alive.
    #[error("entity id space exhausted")]
    EntitiesExhausted,

    /// `add` was called for a kind the entity already owns.
    #[error("{entity} already has a `{component}` component")]
    DuplicateComponent {
        entity: EntityId,
        component: &'static str,
    },

    /// A lookup, view or removal referenced a component the entity lacks.
    #[error("{entity} has no `{component}` component")]
    MissingComponent {
        entity: EntityId,
        component: &'static str,
    },

    /// A hierarchy node names a parent that is not in the pool.
    #[error("parent {parent} of {entity} is not present in the hierarchy")]
    MissingParent { entity: EntityId, parent: EntityId },

    /// A hierarchy node names itself as its parent.
    #[error("{0} cannot be its own parent")]
    SelfParent(EntityId),

    /// Re-parenting would make a node a descendant of itself.
    #[error("moving {entity} under {parent} would create a cycle")]
    HierarchyCycle { entity: EntityId, parent: EntityId },

    /// The same component kind was requested twice in one mutable view.
    #[error("component `{0}` requested more than once in a mutable view")]
    AliasedComponent(&'static str),

    /// Two component kinds hashed to the same type tag.
    #[error("type tag of `{0}` collides with an already registered component")]
    TagCollision(&'static str),

    /// Internal bookkeeping disagrees with itself.
    #[error("storage invariant violated: {0}")]
    InvariantViolation(String),
}
