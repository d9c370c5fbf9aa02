//! Sokoban Arena - box pushing under fire
//!
//! Core modules:
//! - `sim`: Simulation (grid puzzle, monster AI, projectiles, pickups, particles)
//! - `levels`: Level descriptors, built-in levels and procedural generation
//! - `runtime`: Fixed-rate background loop and the render/input boundary
//! - `config`: Data-driven tuning

pub mod config;
pub mod error;
pub mod levels;
pub mod runtime;
pub mod sim;

pub use config::SimConfig;
pub use error::{ConfigError, LevelError, RuntimeError};
pub use levels::{BuiltinLevels, LevelDef, LevelProvider, MonsterDef, generate_level};
pub use runtime::{SimHandle, SimulationLoop};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Nominal simulation rate
    pub const TARGET_TPS: u32 = 60;

    /// Default tile edge in screen units
    pub const TILE_SIZE: f32 = 64.0;

    /// Monster snaps onto its target when closer than this (grid units)
    pub const MONSTER_SNAP_EPSILON: f32 = 0.05;
    /// Monster/player contact threshold per axis (grid units)
    pub const MONSTER_CONTACT_DISTANCE: f32 = 0.4;
    /// Default monster speed (grid units per second)
    pub const MONSTER_DEFAULT_SPEED: f32 = 2.0;
    /// Random/Chase re-target interval
    pub const RANDOM_AI_INTERVAL_MS: f32 = 2000.0;

    /// Bullet travel speed (screen units per second)
    pub const BULLET_SPEED: f32 = 600.0;
    /// Targets closer than this are extrapolated
    pub const BULLET_MIN_DISTANCE: f32 = 50.0;
    /// Extrapolation distance for close targets
    pub const BULLET_EXTRAPOLATE_DISTANCE: f32 = 200.0;
    /// Throw distance when firing along a direction
    pub const BULLET_THROW_DISTANCE: f32 = 1000.0;
    /// Bullet/monster hit radius
    pub const BULLET_HIT_DISTANCE: f32 = 40.0;
    /// Monster hit point sits this far above the tile centre
    pub const BULLET_HIT_Y_CORRECTION: f32 = 10.0;
    /// Margin beyond the board before a bullet is discarded
    pub const BULLET_BOUNDS_MARGIN: f32 = 200.0;
    /// Per-update elapsed time clamp (ms)
    pub const BULLET_MIN_STEP_MS: f32 = 10.0;
    pub const BULLET_MAX_STEP_MS: f32 = 100.0;

    /// Explosion fan
    pub const PARTICLES_PER_EXPLOSION: usize = 16;
    pub const PARTICLE_ANGLE_STEP_DEG: f32 = 30.0;
    pub const PARTICLE_MIN_SPEED: f32 = 150.0;
    pub const PARTICLE_MAX_SPEED: f32 = 350.0;
    /// Live particle budget
    pub const MAX_PARTICLES: usize = 100;
    /// Downward acceleration (units/s²)
    pub const PARTICLE_GRAVITY: f32 = 300.0;
    pub const PARTICLE_DAMPING: f32 = 0.98;
    /// Life drains at this multiple of real time
    pub const PARTICLE_LIFE_RATE: f32 = 2.0;

    /// Stun applied by a stun bullet
    pub const STUN_DURATION_MS: f32 = 3000.0;
}

/// Screen-space centre of a grid cell
#[inline]
pub fn cell_center(row: f32, col: f32, tile_size: f32, offset: Vec2) -> Vec2 {
    Vec2::new(
        offset.x + col * tile_size + tile_size / 2.0,
        offset.y + row * tile_size + tile_size / 2.0,
    )
}

/// Reverse-map a screen-space point to (row, col)
#[inline]
pub fn screen_to_cell(pos: Vec2, tile_size: f32, offset: Vec2) -> (i32, i32) {
    let local = (pos - offset) / tile_size;
    (local.y.floor() as i32, local.x.floor() as i32)
}
