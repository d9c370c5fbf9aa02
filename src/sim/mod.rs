//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No threading or platform dependencies

pub mod grid;
pub mod monster;
pub mod particles;
pub mod pickup;
pub mod projectile;
pub mod puzzle;
pub mod snapshot;
pub mod state;
pub mod tick;

pub use grid::{BoardGeometry, Cell, CellKind, Direction, GridWorld, ParsedTemplate, PickupMarker, Terrain};
pub use monster::{AiState, Monster, MonsterKind, MonsterSystem, MonsterUpdate};
pub use particles::{EXPLOSION_PALETTE, ExplosionParticle, ParticleSystem};
pub use pickup::{Pickup, PickupCategory, PickupKind, PickupSystem, roll_ammo_kind};
pub use projectile::{Aim, Bullet, BulletHit, BulletKind, ProjectileSystem};
pub use puzzle::{AmmoCounts, PlayerAgent, PuzzleState, Timer};
pub use snapshot::{BulletView, MonsterView, PickupView, PlayerView, Snapshot};
pub use state::{GameEvent, GameSession, ammo_per_pickup};
pub use tick::{Intent, TickInput, TickReport, apply_intent, tick};
