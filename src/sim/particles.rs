//! Explosion particles (visual only, never read by gameplay)

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Explosion palette (0xRRGGBB)
pub const EXPLOSION_PALETTE: [u32; 4] = [0xff5a1f, 0xffc107, 0xff2d55, 0xfff3b0];

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplosionParticle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
    pub max_life: f32,
    pub size: f32,
    pub color: u32,
}

#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<ExplosionParticle>,
    budget: usize,
}

impl ParticleSystem {
    pub fn new(budget: usize) -> Self {
        Self {
            particles: Vec::with_capacity(budget),
            budget,
        }
    }

    /// Emit a fan of particles at `center` (screen space).
    /// Skipped entirely when the burst would exceed the budget.
    pub fn spawn<R: Rng + ?Sized>(&mut self, center: Vec2, rng: &mut R) -> bool {
        if self.particles.len() + PARTICLES_PER_EXPLOSION > self.budget {
            return false;
        }
        for i in 0..PARTICLES_PER_EXPLOSION {
            let angle = (i as f32 * PARTICLE_ANGLE_STEP_DEG).to_radians();
            let speed = rng.random_range(PARTICLE_MIN_SPEED..PARTICLE_MAX_SPEED);
            let color = EXPLOSION_PALETTE[rng.random_range(0..EXPLOSION_PALETTE.len())];
            self.particles.push(ExplosionParticle {
                pos: center,
                vel: Vec2::from_angle(angle) * speed,
                life: 1.0,
                max_life: 1.0,
                size: rng.random_range(3.0..7.0),
                color,
            });
        }
        true
    }

    /// Integrate and age. Returns true if any particle was live.
    pub fn update(&mut self, dt_ms: f32) -> bool {
        if self.particles.is_empty() {
            return false;
        }
        let dt = dt_ms / 1000.0;
        for particle in self.particles.iter_mut() {
            particle.pos += particle.vel * dt;
            particle.vel.y += PARTICLE_GRAVITY * dt;
            particle.vel *= PARTICLE_DAMPING;
            particle.life -= dt * PARTICLE_LIFE_RATE;
        }
        self.particles.retain(|p| p.life > 0.0);
        true
    }

    pub fn particles(&self) -> &[ExplosionParticle] {
        &self.particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
