//! # engine_component
//!
//! The storage engine behind the scene: entities, their components, and the
//! queries that walk them.
//!
//! This crate provides:
//!
//! - [`EntityId`]: small recyclable `u32` identifiers.
//! - [`Component`]: the contract every stored kind satisfies, with a stable
//!   [`ComponentTypeId`] tag.
//! - [`ComponentPool`]: dense sparse-set storage with O(1) swap-remove.
//! - [`HierarchicalPool`]: depth-first storage for [`SceneNode`]-like kinds
//!   where every subtree stays contiguous.
//! - [`Registry`]: entity lifecycle, lazily created pools, views and
//!   filters.
//!
//! Everything here is single-threaded. References returned by the registry
//! borrow it, so holding one across a structural mutation does not compile.

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod query;
pub mod registry;
mod sparse;
pub mod storage;

pub use component::{Component, ComponentInfo, ComponentTypeId};
pub use config::RegistryConfig;
pub use entity::{EntityAllocator, EntityId};
pub use error::{EcsError, EcsResult};
pub use hierarchy::{HierarchicalPool, HierarchyNode, SceneNode};
pub use query::{ComponentSet, ComponentSetMut, Filter, FilterIter};
pub use registry::Registry;
pub use storage::{ComponentPool, ComponentStorage, ComponentStorageMut, ErasedPool};
