//! Monster AI and movement
//!
//! Each monster walks continuously toward a discrete target cell. Its AI
//! state picks the next target once the current one is reached.

use glam::Vec2;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::grid::{BoardGeometry, Cell, Direction, GridWorld};
use crate::consts::*;
use crate::error::LevelError;
use crate::levels::MonsterDef;

/// Monster archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterKind {
    Patrol,
    Circle,
    Random,
    Chase,
    Straight,
    Bounce,
}

/// Per-kind AI state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiState {
    /// Cycle through waypoints in order
    Patrol { waypoints: Vec<Cell>, index: usize },
    /// Same mechanics as Patrol over a closed loop
    Circle { waypoints: Vec<Cell>, index: usize },
    /// Wander to a random neighbour every interval
    Random { timer_ms: f32, interval_ms: f32 },
    /// Pathfinding is not implemented; wanders like Random
    Chase { timer_ms: f32, interval_ms: f32 },
    /// March along `direction`, teleporting back to `origin` when blocked
    Straight {
        direction: Direction,
        origin: Cell,
        returning: bool,
    },
}

/// A monster entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monster {
    pub id: u32,
    pub kind: MonsterKind,
    pub spawn: Cell,
    /// Continuous position in grid units (x = col, y = row)
    pub pos: Vec2,
    /// Cell being walked toward
    pub target: Cell,
    pub facing: Direction,
    /// Grid units per second
    pub speed: f32,
    pub ai: AiState,
    pub active: bool,
    pub stun_ms: f32,
}

impl Monster {
    /// Build a monster from its level descriptor
    pub fn from_def(id: u32, def: &MonsterDef, grid: &GridWorld, interval_ms: f32) -> Self {
        let spawn = def.spawn;
        let (ai, target) = match def.kind {
            MonsterKind::Patrol | MonsterKind::Circle => {
                let target = def
                    .waypoints
                    .first()
                    .copied()
                    .filter(|c| grid.is_traversable(*c))
                    .unwrap_or(spawn);
                let waypoints = def.waypoints.clone();
                let ai = if def.kind == MonsterKind::Patrol {
                    AiState::Patrol { waypoints, index: 0 }
                } else {
                    AiState::Circle { waypoints, index: 0 }
                };
                (ai, target)
            }
            MonsterKind::Random => (
                AiState::Random {
                    timer_ms: 0.0,
                    interval_ms,
                },
                spawn,
            ),
            MonsterKind::Chase => (
                AiState::Chase {
                    timer_ms: 0.0,
                    interval_ms,
                },
                spawn,
            ),
            MonsterKind::Straight | MonsterKind::Bounce => {
                let next = spawn.step(def.direction);
                let target = if grid.is_traversable(next) { next } else { spawn };
                (
                    AiState::Straight {
                        direction: def.direction,
                        origin: spawn,
                        returning: false,
                    },
                    target,
                )
            }
        };

        Self {
            id,
            kind: def.kind,
            spawn,
            pos: spawn.as_vec2(),
            target,
            facing: def.direction,
            speed: def.speed,
            ai,
            active: true,
            stun_ms: 0.0,
        }
    }

    #[inline]
    pub fn at_target(&self) -> bool {
        self.pos.distance(self.target.as_vec2()) < MONSTER_SNAP_EPSILON
    }

    pub fn is_stunned(&self) -> bool {
        self.stun_ms > 0.0
    }

    /// Nearest cell to the continuous position
    pub fn cell(&self) -> Cell {
        Cell::new(self.pos.y.round() as i32, self.pos.x.round() as i32)
    }

    /// Pick the next target if the AI wants one. Returns true on teleport.
    fn think(&mut self, dt_ms: f32, grid: &GridWorld, rng: &mut Pcg32) -> bool {
        let at_target = self.at_target();
        match &mut self.ai {
            AiState::Patrol { waypoints, index } | AiState::Circle { waypoints, index } => {
                if at_target && !waypoints.is_empty() {
                    // Next traversable waypoint, wrapping; blocked ones are skipped
                    let len = waypoints.len();
                    if let Some(next) = (1..=len)
                        .map(|step| (*index + step) % len)
                        .find(|&i| grid.is_traversable(waypoints[i]))
                    {
                        *index = next;
                        self.target = waypoints[next];
                    }
                }
                false
            }
            AiState::Random {
                timer_ms,
                interval_ms,
            }
            | AiState::Chase {
                timer_ms,
                interval_ms,
            } => {
                *timer_ms += dt_ms;
                if at_target && *timer_ms >= *interval_ms {
                    *timer_ms = 0.0;
                    let dir = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
                    let candidate = self.target.step(dir);
                    if grid.is_traversable(candidate) {
                        self.target = candidate;
                    }
                }
                false
            }
            AiState::Straight {
                direction,
                origin,
                returning,
            } => {
                if !at_target {
                    return false;
                }
                *returning = false;
                let next = self.target.step(*direction);
                if grid.is_traversable(next) {
                    self.target = next;
                    return false;
                }
                if self.target == *origin {
                    // Boxed in at spawn: wait for the way out to clear
                    *returning = true;
                    return false;
                }

                // Blocked: jump straight back to spawn
                self.pos = origin.as_vec2();
                let first = origin.step(*direction);
                self.target = if grid.is_traversable(first) { first } else { *origin };
                *returning = true;
                true
            }
        }
    }

    /// Interpolate toward the target at `speed`, snapping when close
    fn advance(&mut self, dt_ms: f32) {
        let goal = self.target.as_vec2();
        let to_target = goal - self.pos;
        let dist = to_target.length();
        if dist < MONSTER_SNAP_EPSILON {
            self.pos = goal;
            return;
        }

        self.facing = Direction::from_vector(to_target, self.facing);
        let step = self.speed * dt_ms / 1000.0;
        if step >= dist {
            self.pos = goal;
        } else {
            self.pos += to_target / dist * step;
            if self.pos.distance(goal) < MONSTER_SNAP_EPSILON {
                self.pos = goal;
            }
        }
    }

    /// Pick a new target after the current one was blocked under us.
    /// Returns true if the monster had to be sent back to spawn.
    fn fall_back(&mut self, grid: &GridWorld) -> bool {
        if !matches!(self.ai, AiState::Straight { .. }) {
            let row = self.pos.y.floor() as i32;
            let col = self.pos.x.floor() as i32;
            let around = [
                Cell::new(row, col),
                Cell::new(row + 1, col),
                Cell::new(row, col + 1),
                Cell::new(row + 1, col + 1),
            ];
            let pos = self.pos;
            let nearest = around
                .into_iter()
                .filter(|c| grid.is_traversable(*c))
                .min_by(|a, b| {
                    pos.distance_squared(a.as_vec2())
                        .total_cmp(&pos.distance_squared(b.as_vec2()))
                });
            if let Some(cell) = nearest {
                self.target = cell;
                return false;
            }
        }

        self.pos = self.spawn.as_vec2();
        self.target = self.spawn;
        if let AiState::Straight {
            direction,
            returning,
            ..
        } = &mut self.ai
        {
            let first = self.spawn.step(*direction);
            if grid.is_traversable(first) {
                self.target = first;
            }
            *returning = true;
        }
        true
    }
}

/// Result of one monster pass
#[derive(Debug, Clone, Default)]
pub struct MonsterUpdate {
    pub changed: bool,
    pub teleported: Vec<u32>,
}

/// Owns all monsters (sorted by id)
#[derive(Debug, Clone)]
pub struct MonsterSystem {
    monsters: Vec<Monster>,
    defs: Vec<MonsterDef>,
    rng: Pcg32,
    interval_ms: f32,
}

impl MonsterSystem {
    /// Spawn every descriptor. Fails if a spawn cell is blocked.
    pub fn spawn(
        defs: &[MonsterDef],
        grid: &GridWorld,
        interval_ms: f32,
        seed: u64,
    ) -> Result<Self, LevelError> {
        if let Some(def) = defs.iter().find(|d| !grid.is_traversable(d.spawn)) {
            return Err(LevelError::MonsterSpawnBlocked {
                row: def.spawn.row,
                col: def.spawn.col,
            });
        }
        let mut system = Self {
            monsters: Vec::new(),
            defs: defs.to_vec(),
            rng: Pcg32::seed_from_u64(seed),
            interval_ms,
        };
        system.respawn(grid);
        Ok(system)
    }

    /// Recreate all monsters from their descriptors
    pub fn respawn(&mut self, grid: &GridWorld) {
        self.monsters = self
            .defs
            .iter()
            .enumerate()
            .map(|(i, def)| Monster::from_def(i as u32 + 1, def, grid, self.interval_ms))
            .collect();
    }

    /// Stun timers, AI, then movement. Stunned monsters hold still.
    pub fn update(&mut self, dt_ms: f32, grid: &GridWorld) -> MonsterUpdate {
        let mut result = MonsterUpdate::default();
        for monster in self.monsters.iter_mut().filter(|m| m.active) {
            if monster.stun_ms > 0.0 {
                monster.stun_ms = (monster.stun_ms - dt_ms).max(0.0);
                result.changed = true;
                continue;
            }

            let before = (monster.pos, monster.target, monster.facing);
            if monster.think(dt_ms, grid, &mut self.rng) {
                log::debug!("Monster {} teleported to spawn", monster.id);
                result.teleported.push(monster.id);
            }
            monster.advance(dt_ms);
            if before != (monster.pos, monster.target, monster.facing) {
                result.changed = true;
            }
        }
        result
    }

    /// Re-target monsters whose target cell just stopped being traversable
    /// (a box was pushed into it). Returns the ids sent back to spawn.
    pub fn retarget_blocked(&mut self, grid: &GridWorld) -> Vec<u32> {
        let mut teleported = Vec::new();
        for monster in self.monsters.iter_mut().filter(|m| m.active) {
            if grid.is_traversable(monster.target) {
                continue;
            }
            if monster.fall_back(grid) {
                log::debug!("Monster {} lost its path and returned to spawn", monster.id);
                teleported.push(monster.id);
            }
        }
        teleported
    }

    /// Ids of monsters touching the player's cell
    pub fn touching(&self, player: Cell) -> Vec<u32> {
        let p = player.as_vec2();
        self.monsters
            .iter()
            .filter(|m| m.active)
            .filter(|m| {
                (m.pos.x - p.x).abs() < MONSTER_CONTACT_DISTANCE
                    && (m.pos.y - p.y).abs() < MONSTER_CONTACT_DISTANCE
            })
            .map(|m| m.id)
            .collect()
    }

    /// Screen-space centres for bullet collision
    pub fn screen_positions(&self, geometry: &BoardGeometry) -> Vec<(u32, Vec2)> {
        self.monsters
            .iter()
            .filter(|m| m.active)
            .map(|m| (m.id, geometry.to_screen(m.pos)))
            .collect()
    }

    /// True if a monster stands on or is heading into `cell`
    pub fn occupies(&self, cell: Cell) -> bool {
        self.monsters
            .iter()
            .any(|m| m.active && (m.target == cell || m.cell() == cell))
    }

    /// Remove a monster, returning it
    pub fn kill(&mut self, id: u32) -> Option<Monster> {
        let idx = self.monsters.iter().position(|m| m.id == id)?;
        let mut monster = self.monsters.remove(idx);
        monster.active = false;
        Some(monster)
    }

    pub fn stun(&mut self, id: u32, duration_ms: f32) -> bool {
        match self.monsters.iter_mut().find(|m| m.id == id && m.active) {
            Some(monster) => {
                monster.stun_ms = duration_ms;
                true
            }
            None => false,
        }
    }

    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    pub fn get(&self, id: u32) -> Option<&Monster> {
        self.monsters.iter().find(|m| m.id == id)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut Monster> {
        self.monsters.iter_mut().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(lines: &[&str]) -> GridWorld {
        GridWorld::parse(lines).unwrap().grid
    }

    fn def(kind: MonsterKind, spawn: Cell) -> MonsterDef {
        MonsterDef {
            kind,
            spawn,
            speed: 2.0,
            waypoints: Vec::new(),
            direction: Direction::Right,
        }
    }

    fn run(system: &mut MonsterSystem, grid: &GridWorld, ticks: usize, dt_ms: f32) -> Vec<u32> {
        let mut teleported = Vec::new();
        for _ in 0..ticks {
            teleported.extend(system.update(dt_ms, grid).teleported);
        }
        teleported
    }

    #[test]
    fn test_movement_snaps_onto_target() {
        let g = grid(&["#####", "#@..#", "#####"]);
        let mut monster = Monster::from_def(1, &def(MonsterKind::Random, Cell::new(1, 2)), &g, 2000.0);
        monster.target = Cell::new(1, 3);
        // 2 u/s * 0.48 s = 0.96, within epsilon of the target
        monster.advance(480.0);
        assert_eq!(monster.pos, Vec2::new(3.0, 1.0));
        assert_eq!(monster.facing, Direction::Right);
        assert!(monster.at_target());
    }

    #[test]
    fn test_movement_partial_step() {
        let g = grid(&["#####", "#@..#", "#....#", "#####"]);
        let mut monster = Monster::from_def(1, &def(MonsterKind::Random, Cell::new(1, 2)), &g, 2000.0);
        monster.target = Cell::new(2, 2);
        monster.advance(250.0);
        assert!((monster.pos.y - 1.5).abs() < 1e-5);
        assert_eq!(monster.facing, Direction::Down);
    }

    #[test]
    fn test_patrol_cycles_waypoints() {
        let g = grid(&["######", "#@...#", "######"]);
        let mut d = def(MonsterKind::Patrol, Cell::new(1, 2));
        d.waypoints = vec![Cell::new(1, 2), Cell::new(1, 4)];
        d.speed = 10.0;
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert_eq!(system.monsters()[0].target, Cell::new(1, 2));

        system.update(16.0, &g);
        assert_eq!(system.monsters()[0].target, Cell::new(1, 4));
        // 0.16 per tick: arrives on the 13th tick
        run(&mut system, &g, 12, 16.0);
        assert_eq!(system.monsters()[0].pos, Vec2::new(4.0, 1.0));
        system.update(16.0, &g);
        // Wrapped back to the first waypoint
        assert_eq!(system.monsters()[0].target, Cell::new(1, 2));
    }

    #[test]
    fn test_circle_holds_when_every_other_waypoint_blocked() {
        let g = grid(&["######", "#@.B.#", "######"]);
        let mut d = def(MonsterKind::Circle, Cell::new(1, 2));
        d.waypoints = vec![Cell::new(1, 2), Cell::new(1, 3)];
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        run(&mut system, &g, 10, 16.0);
        assert_eq!(system.monsters()[0].target, Cell::new(1, 2));
    }

    #[test]
    fn test_patrol_skips_blocked_waypoint() {
        let g = grid(&["#######", "#@....#", "#..B..#", "#.....#", "#######"]);
        let mut d = def(MonsterKind::Patrol, Cell::new(3, 1));
        d.waypoints = vec![Cell::new(3, 1), Cell::new(2, 3), Cell::new(3, 5)];
        d.speed = 10.0;
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();

        system.update(16.0, &g);
        assert_eq!(system.monsters()[0].target, Cell::new(3, 5));
        // 4 cells at 0.16 per tick
        run(&mut system, &g, 30, 16.0);
        let m = &system.monsters()[0];
        assert_eq!(m.target, Cell::new(3, 1));
        assert!(m.pos.x < 5.0);
        assert!(matches!(m.ai, AiState::Patrol { index: 0, .. }));
    }

    #[test]
    fn test_random_waits_for_interval_and_stays_traversable() {
        let g = grid(&["#####", "#...#", "#.@.#", "#.B.#", "#####"]);
        let d = def(MonsterKind::Random, Cell::new(2, 2));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 42).unwrap();

        run(&mut system, &g, 10, 100.0);
        assert_eq!(system.monsters()[0].target, Cell::new(2, 2));

        for _ in 0..500 {
            system.update(100.0, &g);
            let m = &system.monsters()[0];
            assert!(g.is_traversable(m.target));
        }
    }

    #[test]
    fn test_chase_wanders_like_random() {
        let g = grid(&["#####", "#...#", "#.@.#", "#...#", "#####"]);
        let d = def(MonsterKind::Chase, Cell::new(2, 2));
        let mut system = MonsterSystem::spawn(&[d], &g, 100.0, 9).unwrap();
        let mut moved = false;
        for _ in 0..200 {
            system.update(50.0, &g);
            moved |= system.monsters()[0].target != Cell::new(2, 2);
            assert!(g.is_traversable(system.monsters()[0].target));
        }
        assert!(moved);
    }

    #[test]
    fn test_straight_teleports_to_spawn() {
        let g = grid(&["######", "#@...#", "######"]);
        let mut d = def(MonsterKind::Straight, Cell::new(1, 2));
        d.speed = 100.0;
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert_eq!(system.monsters()[0].target, Cell::new(1, 3));

        // First tick reaches (1,3), second retargets to (1,4)
        system.update(100.0, &g);
        assert_eq!(system.monsters()[0].pos, Vec2::new(3.0, 1.0));
        system.update(100.0, &g);
        assert_eq!(system.monsters()[0].target, Cell::new(1, 4));
        assert_eq!(system.monsters()[0].pos, Vec2::new(4.0, 1.0));

        // (1,5) is a wall: reset without passing through (1,3)
        let result = system.update(1.0, &g);
        assert_eq!(result.teleported, vec![1]);
        let m = &system.monsters()[0];
        assert_eq!(m.target, Cell::new(1, 3));
        // One 1 ms step (0.1 units) out of spawn
        assert!((m.pos - Vec2::new(2.1, 1.0)).length() < 1e-3);
        assert!(matches!(m.ai, AiState::Straight { returning: true, .. }));
    }

    #[test]
    fn test_teleport_lands_exactly_on_spawn() {
        let g = grid(&["######", "#@...#", "######"]);
        let d = def(MonsterKind::Straight, Cell::new(1, 2));
        let mut monster = Monster::from_def(1, &d, &g, 2000.0);
        monster.pos = Vec2::new(4.0, 1.0);
        monster.target = Cell::new(1, 4);
        let mut rng = Pcg32::seed_from_u64(1);

        assert!(monster.think(16.0, &g, &mut rng));
        assert_eq!(monster.pos, Cell::new(1, 2).as_vec2());
        assert_eq!(monster.target, Cell::new(1, 3));
    }

    #[test]
    fn test_straight_boxed_in_at_spawn_waits() {
        let g = grid(&["#####", "#@..#", "#####"]);
        let d = def(MonsterKind::Straight, Cell::new(1, 3));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert_eq!(system.monsters()[0].target, Cell::new(1, 3));

        for _ in 0..60 {
            let update = system.update(16.0, &g);
            assert!(!update.changed);
            assert!(update.teleported.is_empty());
        }
        let m = &system.monsters()[0];
        assert_eq!(m.pos, Vec2::new(3.0, 1.0));
        assert!(matches!(m.ai, AiState::Straight { returning: true, .. }));
    }

    #[test]
    fn test_box_pushed_into_target_retargets() {
        let mut g = grid(&["#######", "#@.B..#", "#######"]);
        let d = def(MonsterKind::Random, Cell::new(1, 5));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        {
            let m = system.get_mut(1).unwrap();
            m.target = Cell::new(1, 4);
            m.pos = Vec2::new(4.6, 1.0);
        }
        g.move_box(Cell::new(1, 3), Cell::new(1, 4));

        assert!(system.retarget_blocked(&g).is_empty());
        assert_eq!(system.monsters()[0].target, Cell::new(1, 5));
    }

    #[test]
    fn test_straight_sent_home_when_path_boxed() {
        let mut g = grid(&["#######", "#@.B..#", "#######"]);
        let mut d = def(MonsterKind::Straight, Cell::new(1, 2));
        d.direction = Direction::Right;
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert_eq!(system.monsters()[0].target, Cell::new(1, 3));
        g.move_box(Cell::new(1, 3), Cell::new(1, 4));
        system.get_mut(1).unwrap().target = Cell::new(1, 4);
        system.get_mut(1).unwrap().pos = Vec2::new(3.5, 1.0);

        assert_eq!(system.retarget_blocked(&g), vec![1]);
        let m = &system.monsters()[0];
        assert_eq!(m.pos, Vec2::new(2.0, 1.0));
        assert_eq!(m.target, Cell::new(1, 3));
        assert!(g.is_traversable(m.target));
    }

    #[test]
    fn test_bounce_blocked_by_box() {
        let g = grid(&["######", "#@.B.#", "######"]);
        let mut d = def(MonsterKind::Bounce, Cell::new(1, 1));
        d.speed = 100.0;
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        let teleported = run(&mut system, &g, 3, 100.0);
        assert!(!teleported.is_empty());
        assert!(system.monsters()[0].pos.x <= 2.0);
    }

    #[test]
    fn test_stunned_monster_holds_still() {
        let g = grid(&["######", "#@...#", "######"]);
        let d = def(MonsterKind::Straight, Cell::new(1, 2));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert!(system.stun(1, 300.0));
        system.update(100.0, &g);
        system.update(100.0, &g);
        let m = &system.monsters()[0];
        assert_eq!(m.pos, Vec2::new(2.0, 1.0));
        assert!((m.stun_ms - 100.0).abs() < 1e-3);
        system.update(100.0, &g);
        system.update(100.0, &g);
        assert!(!system.monsters()[0].is_stunned());
        assert!(system.monsters()[0].pos.x > 2.0);
    }

    #[test]
    fn test_touching_threshold() {
        let g = grid(&["#####", "#@..#", "#####"]);
        let d = def(MonsterKind::Random, Cell::new(1, 2));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert!(system.touching(Cell::new(1, 1)).is_empty());
        system.get_mut(1).unwrap().pos = Vec2::new(1.35, 1.1);
        assert_eq!(system.touching(Cell::new(1, 1)), vec![1]);
    }

    #[test]
    fn test_blocked_spawn_fails() {
        let g = grid(&["#####", "#@B.#", "#####"]);
        let d = def(MonsterKind::Random, Cell::new(1, 2));
        assert!(matches!(
            MonsterSystem::spawn(&[d], &g, 2000.0, 1),
            Err(LevelError::MonsterSpawnBlocked { row: 1, col: 2 })
        ));
    }

    #[test]
    fn test_kill_and_respawn() {
        let g = grid(&["#####", "#@..#", "#####"]);
        let d = def(MonsterKind::Random, Cell::new(1, 2));
        let mut system = MonsterSystem::spawn(&[d], &g, 2000.0, 1).unwrap();
        assert!(system.kill(1).is_some());
        assert!(system.monsters().is_empty());
        assert!(system.kill(1).is_none());
        system.respawn(&g);
        assert_eq!(system.monsters().len(), 1);
    }
}
