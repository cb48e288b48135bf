//! Scene animation loop.
//!
//! Each step runs two passes over the registry:
//!
//! 1. Integrate [`Velocity`] into [`LocalPosition`] for every entity holding
//!    both.
//! 2. Propagate [`WorldPosition`] down the scene hierarchy. The hierarchy
//!    pool is laid out depth-first, so one front-to-back walk sees every
//!    parent before its children.
//!
//! Steps are paced against a running deadline. A step that finishes late
//! resets the deadline instead of trying to catch up.

use std::time::{Duration, Instant};

use anyhow::{Result, ensure};
use glam::Vec2;
use tracing::{debug, info, warn};

use engine_component::{EntityId, HierarchyNode, Registry, SceneNode};

use crate::scene::{LocalPosition, Velocity, WorldPosition};

/// How fast and how long the scene animates.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Simulation steps per wall-clock second. Also fixes the step length.
    pub ticks_per_second: f64,
    /// Stop after this many steps; `None` animates until the process exits.
    pub tick_limit: Option<u64>,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60.0,
            tick_limit: None,
        }
    }
}

/// Owns the registry being animated.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    registry: Registry,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, registry: Registry) -> Self {
        Self {
            tick_id: 0,
            config,
            registry,
        }
    }

    /// Steps taken so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Advance the scene by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        self.tick_id += 1;

        let moved = self
            .registry
            .for_each_mut::<(LocalPosition, Velocity), _>(
                |_, (local, velocity): (&mut LocalPosition, &mut Velocity)| {
                    local.0 += velocity.0 * dt;
                },
            )?;
        let propagated = propagate_world_positions(&mut self.registry)?;

        debug!(tick_id = self.tick_id, dt, moved, propagated, "scene stepped");
        Ok(())
    }

    /// Step the scene at the configured rate until the tick limit is hit.
    pub fn run(&mut self) -> Result<()> {
        ensure!(
            self.config.ticks_per_second > 0.0,
            "ticks_per_second must be positive, got {}",
            self.config.ticks_per_second
        );
        let step = Duration::from_secs_f64(1.0 / self.config.ticks_per_second);
        let limit = self.config.tick_limit;

        info!(
            ticks_per_second = self.config.ticks_per_second,
            ?limit,
            "animating scene"
        );

        let mut deadline = Instant::now() + step;
        let mut steps = 0u64;
        while limit.is_none_or(|limit| steps < limit) {
            self.tick(step.as_secs_f32())?;
            steps += 1;

            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(remaining) => {
                    std::thread::sleep(remaining);
                    deadline += step;
                }
                None => {
                    warn!(
                        tick_id = self.tick_id,
                        late_ms = now.duration_since(deadline).as_millis() as u64,
                        "scene step overran its slot"
                    );
                    deadline = now + step;
                }
            }
        }

        info!(steps, "scene animation finished");
        Ok(())
    }
}

/// Recompute [`WorldPosition`] for every scene node, parents first.
///
/// Returns the number of nodes updated.
pub fn propagate_world_positions(registry: &mut Registry) -> Result<usize> {
    let Some(nodes) = registry.storage::<SceneNode>() else {
        return Ok(0);
    };
    let order: Vec<(EntityId, Option<EntityId>)> = nodes
        .iter()
        .map(|(entity, node)| (entity, node.parent()))
        .collect();

    let mut updated = 0;
    for (entity, parent) in order {
        let Ok(local) = registry.get::<LocalPosition>(entity).map(|p| p.0) else {
            continue;
        };
        let origin = parent
            .and_then(|parent| registry.get::<WorldPosition>(parent).ok())
            .map_or(Vec2::ZERO, |p| p.0);
        if let Ok(world) = registry.get_mut::<WorldPosition>(entity) {
            world.0 = origin + local;
            updated += 1;
        }
    }
    Ok(updated)
}
