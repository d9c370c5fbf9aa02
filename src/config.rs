//! Simulation tuning
//!
//! Loaded from JSON by the host (missing fields fall back to defaults).

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::AmmoCounts;

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Scheduling ===
    /// Ticks per second for the background loop
    pub target_tps: u32,

    // === Board geometry (screen space) ===
    /// Tile edge length
    pub tile_size: f32,
    /// Top-left corner of the board
    pub board_offset: Vec2,

    // === Monsters ===
    /// Random/Chase re-target interval
    pub random_ai_interval_ms: f32,

    // === Projectiles ===
    pub bullet_speed: f32,
    /// Stun applied when a stun bullet lands
    pub stun_duration_ms: f32,

    // === Player ===
    pub starting_ammo: AmmoCounts,
    pub max_ammo: AmmoCounts,
    pub starting_lives: u32,
    pub max_lives: u32,

    // === Effects ===
    /// Live particle budget
    pub particle_budget: usize,

    /// Seed for AI, pickup placement and particles
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            target_tps: TARGET_TPS,

            tile_size: TILE_SIZE,
            board_offset: Vec2::ZERO,

            random_ai_interval_ms: RANDOM_AI_INTERVAL_MS,

            bullet_speed: BULLET_SPEED,
            stun_duration_ms: STUN_DURATION_MS,

            starting_ammo: AmmoCounts {
                normal: 10,
                pierce: 2,
                stun: 2,
            },
            max_ammo: AmmoCounts {
                normal: 20,
                pierce: 5,
                stun: 5,
            },
            starting_lives: 3,
            max_lives: 5,

            particle_budget: MAX_PARTICLES,

            rng_seed: 0x5eed_b0c5,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON, then sanitize it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replace values the simulation cannot run with
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.target_tps == 0 {
            log::warn!("target_tps of 0 rejected, using {}", defaults.target_tps);
            self.target_tps = defaults.target_tps;
        }
        if !(self.tile_size > 0.0) {
            log::warn!("tile_size {} rejected, using {}", self.tile_size, defaults.tile_size);
            self.tile_size = defaults.tile_size;
        }
        if !(self.bullet_speed > 0.0) {
            log::warn!("bullet_speed {} rejected, using {}", self.bullet_speed, defaults.bullet_speed);
            self.bullet_speed = defaults.bullet_speed;
        }
        if self.random_ai_interval_ms < 0.0 {
            self.random_ai_interval_ms = defaults.random_ai_interval_ms;
        }
        self.starting_ammo = self.starting_ammo.min(&self.max_ammo);
        self.starting_lives = self.starting_lives.min(self.max_lives);
        self
    }

    /// Fixed tick duration in milliseconds
    pub fn tick_ms(&self) -> f32 {
        1000.0 / self.target_tps.max(1) as f32
    }
}
