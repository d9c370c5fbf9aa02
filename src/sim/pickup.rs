//! Ammo and lives pickups
//!
//! Placement draws from a shuffled pool of free cells without replacement,
//! so two pickups never share a cell.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::grid::{Cell, GridWorld, Terrain};
use super::projectile::BulletKind;

/// What a pickup grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupKind {
    Ammo(BulletKind),
    Lives,
}

/// Which pickups a system manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupCategory {
    Ammo,
    Lives,
}

/// A pickup entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: u32,
    pub cell: Cell,
    pub kind: PickupKind,
    pub collected: bool,
}

/// Owns the live pickups of one category
#[derive(Debug, Clone)]
pub struct PickupSystem {
    category: PickupCategory,
    pickups: Vec<Pickup>,
    next_id: u32,
}

/// Ammo kind weights: 50% normal, 25% pierce, 25% stun
pub fn roll_ammo_kind<R: Rng + ?Sized>(rng: &mut R) -> BulletKind {
    match rng.random_range(0..4) {
        0 | 1 => BulletKind::Normal,
        2 => BulletKind::Pierce,
        _ => BulletKind::Stun,
    }
}

impl PickupSystem {
    pub fn new(category: PickupCategory) -> Self {
        Self {
            category,
            pickups: Vec::new(),
            next_id: 1,
        }
    }

    /// Place a pickup at a fixed cell (level-authored markers)
    pub fn place(&mut self, cell: Cell, kind: PickupKind) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.pickups.push(Pickup {
            id,
            cell,
            kind,
            collected: false,
        });
        id
    }

    /// Scatter up to `count` pickups over free Floor/Goal cells.
    /// Returns how many were placed.
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        count: usize,
        excluded: &BTreeSet<Cell>,
        rng: &mut R,
    ) -> usize {
        let mut pool: Vec<Cell> = grid
            .cells()
            .filter(|c| matches!(grid.terrain(*c), Some(Terrain::Floor | Terrain::Goal)))
            .filter(|c| !grid.is_wall(*c) && !grid.has_box(*c))
            .filter(|c| !excluded.contains(c) && !self.occupies(*c))
            .collect();
        pool.shuffle(rng);

        let placed = count.min(pool.len());
        for cell in pool.into_iter().take(placed) {
            let kind = match self.category {
                PickupCategory::Ammo => PickupKind::Ammo(roll_ammo_kind(rng)),
                PickupCategory::Lives => PickupKind::Lives,
            };
            self.place(cell, kind);
        }
        if placed < count {
            log::debug!("Only {} of {} {:?} pickups fit", placed, count, self.category);
        }
        placed
    }

    /// Collect everything on the player's cell
    pub fn collect(&mut self, player: Cell) -> Vec<Pickup> {
        let mut collected = Vec::new();
        self.pickups.retain_mut(|p| {
            if p.cell == player {
                p.collected = true;
                collected.push(p.clone());
                false
            } else {
                true
            }
        });
        collected
    }

    pub fn occupies(&self, cell: Cell) -> bool {
        self.pickups.iter().any(|p| p.cell == cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.pickups.iter().map(|p| p.cell)
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn clear(&mut self) {
        self.pickups.clear();
    }
}
