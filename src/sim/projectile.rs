//! Bullets: travel, wall/bounds removal, monster hits
//!
//! Positions are screen space. The board is consulted through
//! `BoardGeometry` to map a bullet back onto its grid cell.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{BoardGeometry, Direction, GridWorld};
use crate::consts::*;

/// Projectile kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletKind {
    Normal,
    Pierce,
    Stun,
}

impl BulletKind {
    /// Render scale (cosmetic)
    pub fn scale(self) -> f32 {
        match self {
            BulletKind::Normal => 1.0,
            BulletKind::Stun => 2.0,
            BulletKind::Pierce => 3.0,
        }
    }
}

/// Where to shoot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aim {
    /// Toward a point
    At(Vec2),
    /// Along a direction, out to the throw distance
    Along(Vec2),
}

/// A bullet entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub id: u32,
    pub pos: Vec2,
    pub target: Vec2,
    /// Normalized travel direction
    pub dir: Vec2,
    pub facing: Direction,
    pub kind: BulletKind,
    pub scale: f32,
    pub active: bool,
    /// Monsters already hit (pierce only)
    pub hit_ids: BTreeSet<u32>,
}

/// A recorded bullet/monster contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletHit {
    pub bullet_id: u32,
    pub monster_id: u32,
    pub kind: BulletKind,
    pub pos: Vec2,
}

/// Owns all live bullets (sorted by id)
#[derive(Debug, Clone, Default)]
pub struct ProjectileSystem {
    bullets: Vec<Bullet>,
    speed: f32,
    next_id: u32,
}

impl ProjectileSystem {
    pub fn new(speed: f32) -> Self {
        Self {
            bullets: Vec::new(),
            speed,
            next_id: 1,
        }
    }

    /// Spawn a bullet and return its id
    pub fn fire(&mut self, origin: Vec2, aim: Aim, kind: BulletKind) -> u32 {
        let mut target = match aim {
            Aim::At(point) => point,
            Aim::Along(dir) => origin + dir.normalize_or_zero() * BULLET_THROW_DISTANCE,
        };

        let delta = target - origin;
        let dir = delta.try_normalize().unwrap_or(Vec2::Y);
        if delta.length() < BULLET_MIN_DISTANCE {
            target = origin + dir * BULLET_EXTRAPOLATE_DISTANCE;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.bullets.push(Bullet {
            id,
            pos: origin,
            target,
            dir,
            facing: Direction::from_vector(dir, Direction::Down),
            kind,
            scale: kind.scale(),
            active: true,
            hit_ids: BTreeSet::new(),
        });
        id
    }

    /// Move bullets and drop those that hit a wall/box or left the board.
    /// Returns true if any bullet was live this pass.
    pub fn update(&mut self, dt_ms: f32, grid: &GridWorld, geometry: &BoardGeometry) -> bool {
        if self.bullets.is_empty() {
            return false;
        }
        let dt = dt_ms.clamp(BULLET_MIN_STEP_MS, BULLET_MAX_STEP_MS) / 1000.0;

        for bullet in self.bullets.iter_mut().filter(|b| b.active) {
            bullet.pos += bullet.dir * self.speed * dt;

            let cell = geometry.to_cell(bullet.pos);
            if grid.blocks_bullets(cell) {
                bullet.active = false;
            } else if !geometry.contains_with_margin(bullet.pos, BULLET_BOUNDS_MARGIN) {
                bullet.active = false;
            }
        }

        self.purge();
        true
    }

    /// Test every bullet against monster hit points (screen space).
    ///
    /// Normal and stun bullets stop at their first hit. Pierce bullets keep
    /// going and hit each monster at most once.
    pub fn collide(&mut self, monsters: &[(u32, Vec2)]) -> Vec<BulletHit> {
        let mut hits = Vec::new();

        for bullet in self.bullets.iter_mut().filter(|b| b.active) {
            for &(monster_id, monster_pos) in monsters {
                if bullet.hit_ids.contains(&monster_id) {
                    continue;
                }
                let hit_point = monster_pos - Vec2::new(0.0, BULLET_HIT_Y_CORRECTION);
                if bullet.pos.distance(hit_point) >= BULLET_HIT_DISTANCE {
                    continue;
                }

                hits.push(BulletHit {
                    bullet_id: bullet.id,
                    monster_id,
                    kind: bullet.kind,
                    pos: bullet.pos,
                });
                if bullet.kind == BulletKind::Pierce {
                    bullet.hit_ids.insert(monster_id);
                } else {
                    bullet.active = false;
                    break;
                }
            }
        }

        self.purge();
        hits
    }

    fn purge(&mut self) {
        self.bullets.retain(|b| b.active);
    }

    pub fn clear(&mut self) {
        self.bullets.clear();
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn get(&self, id: u32) -> Option<&Bullet> {
        self.bullets.iter().find(|b| b.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }
}
