//! Simulation settings loaded from JSON

use plume_core::settings::DataSetSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Upper bound on live particles; spawning stops at the cap.
    pub max_particles: usize,
    pub spawn_per_tick: usize,
    /// Seconds a particle lives before it is killed.
    pub lifetime: f32,
    pub ticks: u32,
    pub dt: f32,
    /// Dump the current buffer every N ticks.
    pub dump_every: Option<u32>,
    pub gravity: [f32; 3],
    pub sprite_size: f32,
    pub seed: u64,
    pub data_set: DataSetSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_particles: 10_000,
            spawn_per_tick: 64,
            lifetime: 2.0,
            ticks: 240,
            dt: 1.0 / 60.0,
            dump_every: None,
            gravity: [0.0, -9.8, 0.0],
            sprite_size: 0.05,
            seed: 0x5EED,
            data_set: DataSetSettings::default(),
        }
    }
}
