//! Plume runtime
//!
//! Drives a small particle simulation through a plume data set.

mod extract;
mod settings;
mod sim;

use anyhow::{Context, Result};
use settings::SimulationSettings;
use sim::ParticleSystem;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Plume v{}", plume_core::VERSION);

    let settings: SimulationSettings = match std::env::args().nth(1) {
        Some(path) => plume_core::settings::load_json(&path)
            .with_context(|| format!("loading simulation settings from {}", path))?,
        None => SimulationSettings::default(),
    };
    tracing::info!(?settings, "settings loaded");

    let mut system = ParticleSystem::new(settings.clone());
    let mut sprite_bytes = 0;
    for _ in 0..settings.ticks {
        let frame = system.step();
        sprite_bytes = bytemuck::cast_slice::<_, u8>(&frame.sprites).len();
        tracing::debug!(
            tick = frame.tick,
            live = frame.live,
            spawned = frame.spawned,
            killed = frame.killed,
            "frame"
        );
    }

    tracing::info!(
        ticks = settings.ticks,
        live = system.data_set().prev_num_instances(),
        data_set_bytes = system.data_set().size_bytes(),
        sprite_bytes,
        "simulation finished"
    );
    Ok(())
}
