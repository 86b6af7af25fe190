//! Particle simulation over a double-buffered data set
//!
//! Each step reads last frame's particles from the previous buffer through
//! a register table, writes the integrated result into the current buffer,
//! spawns new particles after them, culls expired ones and extracts sprite
//! vertices before swapping buffers.

use crate::extract::{extract_sprites, SpriteVertex};
use crate::settings::SimulationSettings;
use plume_core::data::{
    BufferSelect, DataSet, DataSetId, DataSetIterator, DataSetIteratorMut, DataSetKind,
    RegisterTable, Variable,
};
use plume_core::math::{LinearColor, Vec3};

// ============================================================================
// Attributes
// ============================================================================

pub fn particle_variables() -> [Variable; 5] {
    [
        Variable::vec3("Position"),
        Variable::vec3("Velocity"),
        Variable::float("Age"),
        Variable::float("Lifetime"),
        Variable::color("Color"),
    ]
}

// Register indices, in the order `particle_variables` appends them.
const REG_POSITION: usize = 0;
const REG_VELOCITY: usize = 3;
const REG_AGE: usize = 6;
const REG_LIFETIME: usize = 7;
const REG_COLOR: usize = 8;
const NUM_REGISTERS: usize = 12;

/// Deterministic LCG for spawn jitter.
struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        const A: u64 = 1664525;
        const C: u64 = 1013904223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        self.state as u32
    }

    /// Uniform in `[-1, 1]`.
    fn next_signed(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32 * 2.0 - 1.0
    }
}

/// What happened during one step.
#[derive(Debug)]
pub struct Frame {
    pub tick: u32,
    pub spawned: usize,
    pub killed: usize,
    pub live: usize,
    pub sprites: Vec<SpriteVertex>,
}

pub struct ParticleSystem {
    data_set: DataSet,
    settings: SimulationSettings,
    registers: RegisterTable,
    rng: SpawnRng,
    tick: u32,
}

impl ParticleSystem {
    pub fn new(settings: SimulationSettings) -> Self {
        let mut data_set = DataSet::with_id(DataSetId::new("Sparks", DataSetKind::ParticleData))
            .with_settings(settings.data_set.clone());
        data_set.add_variables(particle_variables());
        data_set.finalize();

        Self {
            data_set,
            rng: SpawnRng::new(settings.seed),
            settings,
            registers: RegisterTable::with_capacity(NUM_REGISTERS),
            tick: 0,
        }
    }

    pub fn data_set(&self) -> &DataSet {
        &self.data_set
    }

    /// Run one frame and swap buffers.
    pub fn step(&mut self) -> Frame {
        let carried = self.data_set.prev_num_instances();
        let spawned = self
            .settings
            .spawn_per_tick
            .min(self.settings.max_particles.saturating_sub(carried));

        self.data_set.allocate(carried + spawned);
        self.data_set.set_num_instances(carried);
        if carried > 0 {
            self.integrate(carried);
        }

        self.data_set.set_num_instances(carried + spawned);
        self.spawn(carried, spawned);

        let killed = self.kill_expired();
        let sprites = extract_sprites(&self.data_set, self.settings.sprite_size);

        if let Some(every) = self.settings.dump_every {
            if every > 0 && self.tick % every == 0 {
                self.data_set.dump(BufferSelect::Current);
            }
        }

        let frame = Frame {
            tick: self.tick,
            spawned,
            killed,
            live: self.data_set.num_instances(),
            sprites,
        };
        self.data_set.tick();
        self.tick += 1;
        frame
    }

    /// Previous buffer -> current buffer through the register table.
    fn integrate(&mut self, count: usize) {
        self.registers.clear();
        for variable in particle_variables() {
            let found = self
                .data_set
                .append_to_register_table(&variable, &mut self.registers, 0, false);
            debug_assert!(found, "particle variable {} missing", variable);
        }

        let dt = self.settings.dt;
        let gravity = Vec3::from_array(self.settings.gravity);
        let table = &self.registers;

        // SAFETY: the data set is not touched until the kernel finishes. Inputs
        // point into the previous buffer and outputs into the current one, both
        // allocated for at least `count` instances, and every output register
        // is a distinct column.
        unsafe {
            for axis in 0..3 {
                let vel_in = table.input::<f32>(REG_VELOCITY + axis, count);
                let vel_out = table.output::<f32>(REG_VELOCITY + axis, count);
                let pos_in = table.input::<f32>(REG_POSITION + axis, count);
                let pos_out = table.output::<f32>(REG_POSITION + axis, count);
                let g = gravity[axis];
                for i in 0..count {
                    let v = vel_in[i] + g * dt;
                    vel_out[i] = v;
                    pos_out[i] = pos_in[i] + v * dt;
                }
            }

            let age_in = table.input::<f32>(REG_AGE, count);
            let age_out = table.output::<f32>(REG_AGE, count);
            let life_in = table.input::<f32>(REG_LIFETIME, count);
            let life_out = table.output::<f32>(REG_LIFETIME, count);
            for i in 0..count {
                age_out[i] = age_in[i] + dt;
                life_out[i] = life_in[i];
            }

            for channel in 0..3 {
                let src = table.input::<f32>(REG_COLOR + channel, count);
                table.output::<f32>(REG_COLOR + channel, count).copy_from_slice(src);
            }
            let alpha = table.output::<f32>(REG_COLOR + 3, count);
            for i in 0..count {
                alpha[i] = (1.0 - age_out[i] / life_out[i]).clamp(0.0, 1.0);
            }
        }
    }

    fn spawn(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let lifetime = self.settings.lifetime;
        let jitter: Vec<Vec3> = (0..count)
            .map(|_| {
                Vec3::new(
                    self.rng.next_signed(),
                    self.rng.next_signed().abs() * 4.0 + 2.0,
                    self.rng.next_signed(),
                )
            })
            .collect();

        {
            let mut velocity = DataSetIteratorMut::<Vec3>::named(&mut self.data_set, "Velocity");
            for (i, v) in jitter.iter().enumerate() {
                velocity.set_at(start + i, *v);
            }
        }
        {
            let mut color = DataSetIteratorMut::<LinearColor>::named(&mut self.data_set, "Color");
            for (i, v) in jitter.iter().enumerate() {
                color.set_at(start + i, LinearColor::new(v.x.abs(), 0.5, v.z.abs(), 1.0));
            }
        }
        {
            let mut position = DataSetIteratorMut::<Vec3>::named(&mut self.data_set, "Position");
            for i in start..start + count {
                position.set_at(i, Vec3::ZERO);
            }
        }
        {
            let mut age = DataSetIteratorMut::<f32>::named(&mut self.data_set, "Age");
            for i in start..start + count {
                age.set_at(i, 0.0);
            }
        }
        let mut life = DataSetIteratorMut::<f32>::named(&mut self.data_set, "Lifetime");
        for i in start..start + count {
            life.set_at(i, lifetime);
        }
    }

    /// Kill every particle whose age reached its lifetime. Returns the count.
    fn kill_expired(&mut self) -> usize {
        let ages = DataSetIterator::<f32>::named(&self.data_set, "Age");
        let lifetimes = DataSetIterator::<f32>::named(&self.data_set, "Lifetime");
        let dead: Vec<usize> = ages
            .zip(lifetimes)
            .enumerate()
            .filter(|(_, (age, life))| age >= life)
            .map(|(i, _)| i)
            .collect();

        // Highest first, so each swap pulls in a particle already known alive.
        for &instance in dead.iter().rev() {
            self.data_set.kill_instance(instance);
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SimulationSettings {
        SimulationSettings {
            max_particles: 8,
            spawn_per_tick: 4,
            lifetime: 0.05,
            dt: 0.02,
            gravity: [0.0, -10.0, 0.0],
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn particles_spawn_integrate_and_expire() {
        let mut system = ParticleSystem::new(settings());

        let first = system.step();
        assert_eq!(first.spawned, 4);
        assert_eq!(first.live, 4);
        assert_eq!(first.sprites.len(), 4);
        assert_eq!(system.data_set().prev_num_instances(), 4);

        let second = system.step();
        assert_eq!(second.spawned, 4);
        assert_eq!(second.live, 8);
        // Carried particles were integrated once: y velocity lost g * dt.
        let vel = DataSetIterator::<Vec3>::new(
            system.data_set(),
            &Variable::vec3("Velocity"),
            0,
            BufferSelect::Previous,
        );
        let age = DataSetIterator::<f32>::new(
            system.data_set(),
            &Variable::float("Age"),
            0,
            BufferSelect::Previous,
        );
        assert!((age.get_at(0) - 0.02).abs() < 1e-6);
        assert!(vel.get_at(0).y < 6.0);

        // The cap holds, and the first batch dies once its age reaches 0.05.
        let third = system.step();
        assert_eq!(third.spawned, 0);
        assert_eq!(third.killed, 0);
        let fourth = system.step();
        assert_eq!(fourth.killed, 4);
        assert_eq!(fourth.live, 4);
    }

    #[test]
    fn spawn_is_deterministic() {
        let mut a = ParticleSystem::new(settings());
        let mut b = ParticleSystem::new(settings());
        for _ in 0..3 {
            let fa = a.step();
            let fb = b.step();
            assert_eq!(
                bytemuck::cast_slice::<_, u8>(&fa.sprites),
                bytemuck::cast_slice::<_, u8>(&fb.sprites)
            );
        }
    }

    #[test]
    fn rng_stays_in_range() {
        let mut rng = SpawnRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_signed();
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
