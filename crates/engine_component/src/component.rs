//! Core [`Component`] trait and its type tag.
//!
//! Every kind of data stored in a [`Registry`](crate::Registry) implements
//! [`Component`]. The trait picks the pool flavour through its associated
//! `Storage` type, so hierarchy nodes get [`HierarchicalPool`] and everything
//! else gets the swap-remove [`ComponentPool`].
//!
//! ## Type Tags
//!
//! [`ComponentTypeId`] is the FNV-1a 64-bit hash of the component's type name.
//! It is stable across runs and builds of the same source, which makes it
//! usable as a map key and in diagnostics output.
//!
//! [`HierarchicalPool`]: crate::HierarchicalPool
//! [`ComponentPool`]: crate::ComponentPool

use crate::storage::{ComponentStorage, ErasedPool};

/// A stable identifier for a component kind, derived from its type name with
/// the FNV-1a 64-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Hash a type name into a [`ComponentTypeId`].
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The tag for component type `C`.
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self::from_name(C::type_name())
    }
}

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Component, ComponentPool};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     type Storage = ComponentPool<Self>;
/// }
/// ```
pub trait Component: Sized + 'static {
    /// The pool that stores values of this kind.
    type Storage: ComponentStorage<Self> + ErasedPool;

    /// A human-readable name for this component kind.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the [`ComponentTypeId`] for this kind.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// A snapshot describing one registered pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// The kind's type tag.
    pub type_id: ComponentTypeId,
    /// The kind's type name.
    pub name: &'static str,
    /// Number of records currently stored.
    pub len: usize,
    /// Whether the pool keeps depth-first hierarchy order.
    pub hierarchical: bool,
}
