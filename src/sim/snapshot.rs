//! Read-only view of a session, published after each changed tick
//!
//! Positions of monsters, bullets and particles are in screen space so a
//! renderer can draw them directly. Grid data stays in (row, col).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{Cell, CellKind, Direction};
use super::monster::MonsterKind;
use super::particles::ExplosionParticle;
use super::pickup::PickupKind;
use super::projectile::BulletKind;
use super::puzzle::AmmoCounts;
use super::state::{GameEvent, GameSession};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub cell: Cell,
    pub screen: Vec2,
    pub facing: Direction,
    pub ammo: AmmoCounts,
    pub lives: u32,
    pub build_mode: bool,
    pub in_safe_zone: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterView {
    pub id: u32,
    pub kind: MonsterKind,
    pub screen: Vec2,
    pub facing: Direction,
    pub stunned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletView {
    pub id: u32,
    pub kind: BulletKind,
    pub screen: Vec2,
    pub facing: Direction,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickupView {
    pub cell: Cell,
    pub kind: PickupKind,
}

/// Everything a renderer or HUD needs for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Bumped on every publish
    pub version: u64,
    pub tick: u64,
    pub level_id: u32,
    pub level_name: String,
    pub rows: usize,
    pub cols: usize,
    /// Row-major, pickups overlaid on floor and goal cells
    pub cells: Vec<CellKind>,
    /// Goal cells (an overlaid pickup may hide one in `cells`)
    pub goals: Vec<Cell>,
    pub player: Option<PlayerView>,
    pub monsters: Vec<MonsterView>,
    pub bullets: Vec<BulletView>,
    pub pickups: Vec<PickupView>,
    pub particles: Vec<ExplosionParticle>,
    pub won: bool,
    pub paused: bool,
    pub elapsed_ms: u64,
    pub progress_percent: f32,
    pub boxes_on_goal: usize,
    pub goal_count: usize,
    /// Events since the previous snapshot
    pub events: Vec<GameEvent>,
}

impl Snapshot {
    pub fn capture(session: &GameSession, version: u64, events: Vec<GameEvent>) -> Self {
        let puzzle = session.puzzle();
        let grid = puzzle.grid();
        let geometry = session.geometry();

        let pickups: Vec<PickupView> = session
            .ammo_pickups()
            .pickups()
            .iter()
            .chain(session.lives_pickups().pickups())
            .map(|p| PickupView {
                cell: p.cell,
                kind: p.kind,
            })
            .collect();

        let mut cells: Vec<CellKind> = grid.cells().map(|cell| grid.cell_kind(cell)).collect();
        for pickup in &pickups {
            let index = pickup.cell.row as usize * grid.cols() + pickup.cell.col as usize;
            if let Some(slot @ (CellKind::Floor | CellKind::Goal)) = cells.get_mut(index) {
                *slot = match pickup.kind {
                    PickupKind::Ammo(kind) => CellKind::AmmoPickup(kind),
                    PickupKind::Lives => CellKind::LivesPickup,
                };
            }
        }

        let player = puzzle.player();
        Self {
            version,
            tick: session.time_ticks,
            level_id: session.level_id(),
            level_name: session.level_name().to_string(),
            rows: grid.rows(),
            cols: grid.cols(),
            cells,
            goals: grid.goals().iter().copied().collect(),
            player: Some(PlayerView {
                cell: player.position,
                screen: geometry.to_screen(player.position.as_vec2()),
                facing: player.facing,
                ammo: player.ammo,
                lives: player.lives,
                build_mode: player.build_mode,
                in_safe_zone: grid.is_safe_zone(player.position),
            }),
            monsters: session
                .monsters()
                .monsters()
                .iter()
                .filter(|m| m.active)
                .map(|m| MonsterView {
                    id: m.id,
                    kind: m.kind,
                    screen: geometry.to_screen(m.pos),
                    facing: m.facing,
                    stunned: m.is_stunned(),
                })
                .collect(),
            bullets: session
                .bullets()
                .bullets()
                .iter()
                .map(|b| BulletView {
                    id: b.id,
                    kind: b.kind,
                    screen: b.pos,
                    facing: b.facing,
                    scale: b.scale,
                })
                .collect(),
            pickups,
            particles: session.particles().particles().to_vec(),
            won: puzzle.is_won(),
            paused: puzzle.timer().is_paused(),
            elapsed_ms: puzzle.timer().elapsed_ms(),
            progress_percent: puzzle.progress_percent(),
            boxes_on_goal: puzzle.boxes_on_goal(),
            goal_count: puzzle.goal_count(),
            events,
        }
    }

    pub fn cell(&self, cell: Cell) -> Option<CellKind> {
        if cell.row < 0 || cell.col < 0 || cell.row as usize >= self.rows || cell.col as usize >= self.cols {
            return None;
        }
        self.cells.get(cell.row as usize * self.cols + cell.col as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::levels::{LevelDef, MonsterDef};

    #[test]
    fn test_capture_overlays_pickups() {
        let def = LevelDef {
            id: 4,
            name: "snap".into(),
            template: ["######", "#@2.L#", "#.B*G#", "######"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            monsters: vec![MonsterDef::new(MonsterKind::Random, 1, 3)],
            ammo_pickups: 0,
            lives_pickups: 0,
        };
        let session = GameSession::new(&def, &SimConfig::default()).unwrap();
        let snap = Snapshot::capture(&session, 7, Vec::new());

        assert_eq!(snap.version, 7);
        assert_eq!((snap.rows, snap.cols), (4, 6));
        assert_eq!(snap.cell(Cell::new(0, 0)), Some(CellKind::Wall));
        assert_eq!(snap.cell(Cell::new(1, 2)), Some(CellKind::AmmoPickup(BulletKind::Pierce)));
        assert_eq!(snap.cell(Cell::new(1, 4)), Some(CellKind::LivesPickup));
        assert_eq!(snap.cell(Cell::new(2, 2)), Some(CellKind::Box));
        assert_eq!(snap.cell(Cell::new(2, 3)), Some(CellKind::Box));
        assert_eq!(snap.cell(Cell::new(2, 4)), Some(CellKind::Goal));
        assert_eq!(snap.cell(Cell::new(9, 9)), None);
        // The player is never part of the cell grid
        assert_eq!(snap.cell(Cell::new(1, 1)), Some(CellKind::Floor));
        assert_eq!(snap.player.as_ref().unwrap().cell, Cell::new(1, 1));
        assert_eq!(snap.monsters.len(), 1);
        assert_eq!(snap.goal_count, 2);
        assert_eq!(snap.boxes_on_goal, 1);
        assert!((snap.progress_percent - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_pickup_on_goal_is_overlaid() {
        let def = LevelDef {
            id: 5,
            name: "goal pickup".into(),
            template: ["#####", "#@BG#", "#.G.#", "#####"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            monsters: Vec::new(),
            ammo_pickups: 0,
            lives_pickups: 0,
        };
        let mut session = GameSession::new(&def, &SimConfig::default()).unwrap();
        session.place_pickup(Cell::new(2, 2), PickupKind::Lives);
        let snap = Snapshot::capture(&session, 1, Vec::new());

        assert_eq!(snap.cell(Cell::new(2, 2)), Some(CellKind::LivesPickup));
        assert_eq!(snap.cell(Cell::new(1, 3)), Some(CellKind::Goal));
        assert_eq!(snap.goals, vec![Cell::new(1, 3), Cell::new(2, 2)]);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&Snapshot::default()).unwrap();
        assert!(json.contains("\"version\":0"));
    }
}
