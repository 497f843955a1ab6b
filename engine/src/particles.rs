//! Seeded point-sprite particle systems composited above theme layers.

use serde::{Deserialize, Serialize};

use crate::rng::SeededRandom;
use crate::surface::SurfaceSize;

/// Spawn parameters for one particle system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// Number of live particles (fixed for the system's lifetime)
    pub count: usize,
    /// Velocity components are drawn from `[-speed/2, speed/2)` pixels per frame
    pub speed: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub min_alpha: f32,
    pub max_alpha: f32,
    /// Upper bound on a particle's lifetime in frames
    pub lifetime: f32,
    /// Clip-space depth the system is drawn at
    pub z_index: f32,
    /// Seed of the spawn stream
    pub seed: u32,
}

/// Struct-of-arrays particle state, laid out the way the GPU buffers consume it.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    config: ParticleConfig,
    bounds: SurfaceSize,
    rng: SeededRandom,
    positions: Vec<f32>,
    velocities: Vec<f32>,
    sizes: Vec<f32>,
    alphas: Vec<f32>,
    lifetimes: Vec<f32>,
    size_dirty: bool,
    respawns: u64,
}

impl ParticleSystem {
    pub fn new(config: ParticleConfig, bounds: SurfaceSize) -> Self {
        let n = config.count;
        let mut system = Self {
            config,
            bounds,
            rng: SeededRandom::new(config.seed),
            positions: vec![0.0; n * 2],
            velocities: vec![0.0; n * 2],
            sizes: vec![0.0; n],
            alphas: vec![0.0; n],
            lifetimes: vec![0.0; n],
            size_dirty: true,
            respawns: 0,
        };
        for i in 0..n {
            system.spawn(i);
        }
        system.respawns = 0;
        system
    }

    fn spawn(&mut self, i: usize) {
        let c = self.config;
        let (w, h) = (self.bounds.width as f32, self.bounds.height as f32);
        self.positions[i * 2] = self.rng.next_f32() * w;
        self.positions[i * 2 + 1] = self.rng.next_f32() * h;
        self.velocities[i * 2] = (self.rng.next_f32() - 0.5) * c.speed;
        self.velocities[i * 2 + 1] = (self.rng.next_f32() - 0.5) * c.speed;
        self.sizes[i] = self.rng.range_f32(c.min_size, c.max_size);
        self.alphas[i] = self.rng.range_f32(c.min_alpha, c.max_alpha);
        self.lifetimes[i] = self.rng.next_f32() * c.lifetime;
        self.size_dirty = true;
        self.respawns += 1;
    }

    /// Advances one frame: ages every particle, moves it, and respawns it when it expired or
    /// left the bounds.
    pub fn update(&mut self) {
        let (w, h) = (self.bounds.width as f32, self.bounds.height as f32);
        for i in 0..self.config.count {
            self.lifetimes[i] -= 1.0;
            if self.lifetimes[i] <= 0.0 {
                self.spawn(i);
            }

            self.positions[i * 2] += self.velocities[i * 2];
            self.positions[i * 2 + 1] += self.velocities[i * 2 + 1];

            let (x, y) = (self.positions[i * 2], self.positions[i * 2 + 1]);
            if x < 0.0 || x > w || y < 0.0 || y > h {
                self.spawn(i);
            }
        }
    }

    /// New bounds apply to positions from the next respawn on.
    pub fn resize(&mut self, bounds: SurfaceSize) {
        self.bounds = bounds;
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.config.count
    }

    pub fn is_empty(&self) -> bool {
        self.config.count == 0
    }

    pub fn z_index(&self) -> f32 {
        self.config.z_index
    }

    /// Interleaved `x, y` pairs in pixels.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    pub fn respawns(&self) -> u64 {
        self.respawns
    }

    /// Returns whether sizes changed since the last call, and clears the flag.
    pub fn take_size_dirty(&mut self) -> bool {
        std::mem::take(&mut self.size_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(speed: f32, lifetime: f32) -> ParticleConfig {
        ParticleConfig {
            count: 16,
            speed,
            min_size: 1.0,
            max_size: 2.5,
            min_alpha: 0.2,
            max_alpha: 0.7,
            lifetime,
            z_index: -0.6,
            seed: 777,
        }
    }

    #[test]
    fn same_seed_spawns_identical_systems() {
        let a = ParticleSystem::new(config(0.5, 1000.0), SurfaceSize::new(64, 48));
        let b = ParticleSystem::new(config(0.5, 1000.0), SurfaceSize::new(64, 48));
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.sizes(), b.sizes());
        assert_eq!(a.alphas(), b.alphas());
    }

    #[test]
    fn spawned_values_respect_ranges() {
        let system = ParticleSystem::new(config(0.5, 1000.0), SurfaceSize::new(64, 48));
        assert!(system.sizes().iter().all(|s| (1.0..=2.5).contains(s)));
        assert!(system.alphas().iter().all(|a| (0.2..=0.7).contains(a)));
        for xy in system.positions().chunks_exact(2) {
            assert!((0.0..64.0).contains(&xy[0]) && (0.0..48.0).contains(&xy[1]));
        }
    }

    #[test]
    fn stationary_long_lived_particles_keep_sizes_clean() {
        let mut system = ParticleSystem::new(config(0.0, 1.0e9), SurfaceSize::new(64, 48));
        assert!(system.take_size_dirty(), "initial spawn marks sizes dirty");
        for _ in 0..10 {
            system.update();
            assert!(!system.take_size_dirty());
        }
        assert_eq!(system.respawns(), 0);
    }

    #[test]
    fn expired_particles_respawn_and_dirty_sizes() {
        let mut system = ParticleSystem::new(config(0.0, 1.0), SurfaceSize::new(64, 48));
        system.take_size_dirty();
        system.update();
        assert_eq!(system.respawns(), 16, "lifetime < 1 frame expires everything");
        assert!(system.take_size_dirty());
    }
}
