//! # engine_app: scene demo
//!
//! Drives an [`engine_component::Registry`] through a short fixed-timestep
//! simulation.
//!
//! ## Sequence
//!
//! 1. Build a small scene hierarchy (sun, planets, moon).
//! 2. Run the tick loop for a fixed number of ticks.
//! 3. Report final positions, then tear the scene down recursively.

mod scene;
mod tick;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_component::{Registry, RegistryConfig, SceneNode};
use scene::{Name, WorldPosition};
use tick::{TickConfig, TickLoop};

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("engine_app=info".parse()?)
                .add_directive("engine_component=debug".parse()?),
        )
        .init();

    info!("scene demo starting");

    let mut registry = Registry::with_config(RegistryConfig::new().with_entity_capacity(16));
    let sun = scene::build_solar_system(&mut registry)?;

    let config = TickConfig {
        ticks_per_second: 60.0,
        tick_limit: Some(120),
    };
    let mut tick_loop = TickLoop::new(config, registry);
    tick_loop.run()?;

    let registry = tick_loop.registry();
    for (entity, (name, world)) in &registry.filter::<(Name, WorldPosition)>() {
        info!(%entity, name = %name.0, x = world.0.x, y = world.0.y, "final position");
    }
    for component in registry.component_infos() {
        info!(
            name = component.name,
            type_id = %component.type_id,
            len = component.len,
            hierarchical = component.hierarchical,
            "component pool"
        );
    }

    let registry = tick_loop.registry_mut();
    let destroyed = registry.destroy_recursive::<SceneNode>(sun)?;
    info!(
        destroyed = destroyed.len(),
        alive = registry.alive_count(),
        "scene torn down"
    );

    info!("scene demo shut down");
    Ok(())
}
