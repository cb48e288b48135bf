//! Demo scene: the components the tick loop animates and the hierarchy it
//! starts from.

use anyhow::Result;
use glam::Vec2;

use engine_component::{Component, ComponentPool, EntityId, Registry, SceneNode};

/// Offset from the parent node (or the origin for roots).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalPosition(pub Vec2);

/// Position after accumulating every ancestor's offset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPosition(pub Vec2);

/// Units per second applied to [`LocalPosition`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

/// Display label.
#[derive(Debug, Clone, PartialEq)]
pub struct Name(pub String);

impl Component for LocalPosition {
    type Storage = ComponentPool<Self>;

    fn type_name() -> &'static str {
        "LocalPosition"
    }
}

impl Component for WorldPosition {
    type Storage = ComponentPool<Self>;

    fn type_name() -> &'static str {
        "WorldPosition"
    }
}

impl Component for Velocity {
    type Storage = ComponentPool<Self>;

    fn type_name() -> &'static str {
        "Velocity"
    }
}

impl Component for Name {
    type Storage = ComponentPool<Self>;

    fn type_name() -> &'static str {
        "Name"
    }
}

/// Spawn one positioned scene node under `parent`.
pub fn spawn_node(
    registry: &mut Registry,
    name: &str,
    parent: Option<EntityId>,
    local: Vec2,
) -> Result<EntityId> {
    let entity = registry.create()?;
    let node = match parent {
        Some(parent) => SceneNode::child_of(parent),
        None => SceneNode::root(),
    };
    let attached = registry.add(entity, node).map(|_| ());
    if let Err(err) = attached {
        registry.destroy(entity)?;
        return Err(err.into());
    }
    registry.add(entity, Name(name.to_string()))?;
    registry.add(entity, LocalPosition(local))?;
    registry.add(entity, WorldPosition(local))?;
    Ok(entity)
}

/// Build a small solar system: a sun, two planets, and a moon.
///
/// Returns the sun.
pub fn build_solar_system(registry: &mut Registry) -> Result<EntityId> {
    let sun = spawn_node(registry, "sun", None, Vec2::ZERO)?;
    registry.add(sun, Velocity(Vec2::X))?;

    let earth = spawn_node(registry, "earth", Some(sun), Vec2::new(10.0, 0.0))?;
    registry.add(earth, Velocity(Vec2::new(0.0, 2.0)))?;

    let _mars = spawn_node(registry, "mars", Some(sun), Vec2::new(15.0, 0.0))?;
    let _moon = spawn_node(registry, "moon", Some(earth), Vec2::X)?;

    Ok(sun)
}
