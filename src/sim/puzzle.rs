//! Puzzle rules: player movement, box pushing, goals, timer
//!
//! Illegal moves are rejected by returning `false`; they never error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::grid::{Cell, Direction, GridWorld, ParsedTemplate, Terrain};
use super::projectile::BulletKind;
use crate::error::LevelError;

/// Per-kind ammo counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmmoCounts {
    pub normal: u32,
    pub pierce: u32,
    pub stun: u32,
}

impl AmmoCounts {
    pub fn get(&self, kind: BulletKind) -> u32 {
        match kind {
            BulletKind::Normal => self.normal,
            BulletKind::Pierce => self.pierce,
            BulletKind::Stun => self.stun,
        }
    }

    fn get_mut(&mut self, kind: BulletKind) -> &mut u32 {
        match kind {
            BulletKind::Normal => &mut self.normal,
            BulletKind::Pierce => &mut self.pierce,
            BulletKind::Stun => &mut self.stun,
        }
    }

    /// Add ammo, silently capped at `max`
    pub fn add_clamped(&mut self, kind: BulletKind, amount: u32, max: &AmmoCounts) {
        let slot = self.get_mut(kind);
        *slot = slot.saturating_add(amount).min(max.get(kind));
    }

    /// Consume one round; false when empty
    pub fn take(&mut self, kind: BulletKind) -> bool {
        let slot = self.get_mut(kind);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Per-kind minimum
    pub fn min(&self, other: &AmmoCounts) -> AmmoCounts {
        AmmoCounts {
            normal: self.normal.min(other.normal),
            pierce: self.pierce.min(other.pierce),
            stun: self.stun.min(other.stun),
        }
    }
}

/// The player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAgent {
    pub position: Cell,
    pub facing: Direction,
    pub ammo: AmmoCounts,
    pub build_mode: bool,
    pub lives: u32,
}

/// Level clock
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Timer {
    elapsed_ms: f64,
    paused: bool,
}

impl Timer {
    pub fn advance(&mut self, dt_ms: f32) {
        if !self.paused {
            self.elapsed_ms += dt_ms as f64;
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms as u64
    }
}

/// Grid world plus the player and win bookkeeping
#[derive(Debug, Clone)]
pub struct PuzzleState {
    grid: GridWorld,
    player: PlayerAgent,
    boxes_on_goal: usize,
    won: bool,
    timer: Timer,
    // Captured at load for reset()
    initial_grid: GridWorld,
    initial_player: PlayerAgent,
    initial_boxes_on_goal: usize,
}

impl PuzzleState {
    /// Parse `template` and place the player at its start marker
    pub fn load_level<S: AsRef<str>>(
        template: &[S],
        ammo: AmmoCounts,
        lives: u32,
    ) -> Result<Self, LevelError> {
        let parsed = GridWorld::parse(template)?;
        Ok(Self::from_parsed(&parsed, ammo, lives))
    }

    pub(crate) fn from_parsed(parsed: &ParsedTemplate, ammo: AmmoCounts, lives: u32) -> Self {
        let player = PlayerAgent {
            position: parsed.player_start,
            facing: Direction::Down,
            ammo,
            build_mode: false,
            lives,
        };
        let boxes_on_goal = parsed.grid.boxes_on_goals();
        log::info!(
            "Level loaded: {}x{}, {} boxes, {} goals",
            parsed.grid.rows(),
            parsed.grid.cols(),
            parsed.grid.box_count(),
            parsed.grid.goals().len()
        );
        Self {
            grid: parsed.grid.clone(),
            player: player.clone(),
            boxes_on_goal,
            won: false,
            timer: Timer::default(),
            initial_grid: parsed.grid.clone(),
            initial_player: player,
            initial_boxes_on_goal: boxes_on_goal,
        }
    }

    /// Attempt a one-cell move. Returns true if the player moved.
    pub fn move_player(&mut self, d_row: i32, d_col: i32) -> bool {
        let Some(dir) = Direction::from_delta(d_row, d_col) else {
            return false;
        };
        self.player.facing = dir;
        if self.won {
            return false;
        }

        let dest = self.player.position.step(dir);
        if self.grid.is_wall(dest) {
            return false;
        }

        if self.grid.has_box(dest) {
            let beyond = dest.step(dir);
            if self.grid.is_wall(beyond) || self.grid.has_box(beyond) {
                return false;
            }
            if self.grid.is_goal(dest) {
                self.boxes_on_goal -= 1;
            }
            if self.grid.is_goal(beyond) {
                self.boxes_on_goal += 1;
            }
            self.grid.move_box(dest, beyond);
        }

        self.player.position = dest;
        self.check_win();
        true
    }

    fn check_win(&mut self) {
        if !self.won && !self.grid.goals().is_empty() && self.grid.all_goals_filled() {
            self.won = true;
            log::info!("Level complete in {} ms", self.timer.elapsed_ms());
        }
    }

    pub fn toggle_build_mode(&mut self) -> bool {
        self.player.build_mode = !self.player.build_mode;
        self.player.build_mode
    }

    /// Place a wall in the cell the player faces.
    ///
    /// Needs build mode and a plain floor cell with no box; `occupied` reports
    /// cells held by entities outside the grid (pickups, monsters).
    pub fn build_wall_in_front(&mut self, occupied: impl Fn(Cell) -> bool) -> bool {
        if !self.player.build_mode || self.won {
            return false;
        }
        let target = self.player.position.step(self.player.facing);
        if self.grid.terrain(target) != Some(Terrain::Floor)
            || self.grid.is_wall(target)
            || self.grid.has_box(target)
            || occupied(target)
        {
            return false;
        }
        self.grid.add_built_wall(target);
        true
    }

    /// Restore the grid and player captured at load
    pub fn reset(&mut self) {
        self.grid = self.initial_grid.clone();
        self.player = self.initial_player.clone();
        self.boxes_on_goal = self.initial_boxes_on_goal;
        self.won = false;
        self.timer = Timer::default();
    }

    pub fn player_mut(&mut self) -> &mut PlayerAgent {
        &mut self.player
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    /// Advance the level clock (stops once won)
    pub fn advance_timer(&mut self, dt_ms: f32) {
        if !self.won {
            self.timer.advance(dt_ms);
        }
    }

    // === Read accessors ===

    pub fn grid(&self) -> &GridWorld {
        &self.grid
    }

    pub fn player(&self) -> &PlayerAgent {
        &self.player
    }

    pub fn player_position(&self) -> Cell {
        self.player.position
    }

    pub fn player_direction(&self) -> Direction {
        self.player.facing
    }

    pub fn goals(&self) -> &BTreeSet<Cell> {
        self.grid.goals()
    }

    pub fn safe_zones(&self) -> &BTreeSet<Cell> {
        self.grid.safe_zones()
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Elapsed time at completion, for best-time records
    pub fn completion_time_ms(&self) -> Option<u64> {
        self.won.then(|| self.timer.elapsed_ms())
    }

    pub fn box_count(&self) -> usize {
        self.grid.box_count()
    }

    pub fn goal_count(&self) -> usize {
        self.grid.goals().len()
    }

    pub fn boxes_on_goal(&self) -> usize {
        self.boxes_on_goal
    }

    /// Boxes on goals as a percentage of goals (100 when there are none)
    pub fn progress_percent(&self) -> f32 {
        let goals = self.goal_count();
        if goals == 0 {
            return 100.0;
        }
        self.boxes_on_goal as f32 / goals as f32 * 100.0
    }
}
