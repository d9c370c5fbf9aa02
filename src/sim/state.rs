//! Game session: one level's worth of simulation state
//!
//! The session owns every system. Cross-system effects (kills, stuns,
//! collection) are resolved here from query results, never through shared
//! ownership.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::grid::{BoardGeometry, Cell, GridWorld, PickupMarker};
use super::monster::MonsterSystem;
use super::particles::ParticleSystem;
use super::pickup::{PickupCategory, PickupKind, PickupSystem};
use super::projectile::{Aim, BulletHit, BulletKind, ProjectileSystem};
use super::puzzle::PuzzleState;
use crate::config::SimConfig;
use crate::error::LevelError;
use crate::levels::{LevelDef, LevelProvider};

/// Ammo granted per pickup
pub fn ammo_per_pickup(kind: BulletKind) -> u32 {
    match kind {
        BulletKind::Normal => 5,
        BulletKind::Pierce | BulletKind::Stun => 1,
    }
}

/// Things that happened during a tick (for audio/UI consumers)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Won { elapsed_ms: u64 },
    BoxMoved { from: Cell, to: Cell },
    Fired { bullet_id: u32, kind: BulletKind },
    PickupCollected { cell: Cell, kind: PickupKind },
    MonsterKilled { monster_id: u32 },
    MonsterStunned { monster_id: u32 },
    MonsterTeleported { monster_id: u32 },
    PlayerTouched { monster_id: u32, safe: bool },
    WallBuilt { cell: Cell },
    LevelReset,
}

/// Complete state of a level in play
#[derive(Debug, Clone)]
pub struct GameSession {
    level_id: u32,
    level_name: String,
    config: SimConfig,
    geometry: BoardGeometry,
    puzzle: PuzzleState,
    monsters: MonsterSystem,
    bullets: ProjectileSystem,
    ammo_pickups: PickupSystem,
    lives_pickups: PickupSystem,
    particles: ParticleSystem,
    rng: Pcg32,
    events: Vec<GameEvent>,
    /// Simulation tick counter
    pub time_ticks: u64,
}

impl GameSession {
    /// Load a level and run its spawn passes
    pub fn new(def: &LevelDef, config: &SimConfig) -> Result<Self, LevelError> {
        let parsed = GridWorld::parse(&def.template)?;
        let seed = config.rng_seed ^ (def.id as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        let mut rng = Pcg32::seed_from_u64(seed);

        let puzzle = PuzzleState::from_parsed(&parsed, config.starting_ammo, config.starting_lives);
        let grid = puzzle.grid();
        let monsters =
            MonsterSystem::spawn(&def.monsters, grid, config.random_ai_interval_ms, seed.rotate_left(17))?;

        let mut ammo_pickups = PickupSystem::new(PickupCategory::Ammo);
        let mut lives_pickups = PickupSystem::new(PickupCategory::Lives);
        for &(cell, marker) in &parsed.pickups {
            match marker {
                PickupMarker::Ammo(kind) => ammo_pickups.place(cell, PickupKind::Ammo(kind)),
                PickupMarker::Lives => lives_pickups.place(cell, PickupKind::Lives),
            };
        }

        let mut excluded: BTreeSet<Cell> = BTreeSet::new();
        excluded.insert(parsed.player_start);
        excluded.extend(def.monsters.iter().map(|m| m.spawn));
        excluded.extend(parsed.pickups.iter().map(|(cell, _)| *cell));
        ammo_pickups.spawn(grid, def.ammo_pickups, &excluded, &mut rng);
        excluded.extend(ammo_pickups.cells());
        lives_pickups.spawn(grid, def.lives_pickups, &excluded, &mut rng);

        let geometry = BoardGeometry::new(grid, config.tile_size, config.board_offset);
        log::info!(
            "Session started: level {} '{}' ({} monsters, {} ammo, {} lives pickups)",
            def.id,
            def.name,
            monsters.monsters().len(),
            ammo_pickups.pickups().len(),
            lives_pickups.pickups().len()
        );

        Ok(Self {
            level_id: def.id,
            level_name: def.name.clone(),
            config: config.clone(),
            geometry,
            puzzle,
            monsters,
            bullets: ProjectileSystem::new(config.bullet_speed),
            ammo_pickups,
            lives_pickups,
            particles: ParticleSystem::new(config.particle_budget),
            rng,
            events: Vec::new(),
            time_ticks: 0,
        })
    }

    /// Load a level by id from a provider
    pub fn from_provider(
        provider: &dyn LevelProvider,
        level_id: u32,
        config: &SimConfig,
    ) -> Result<Self, LevelError> {
        let def = provider.require(level_id)?;
        Self::new(&def, config)
    }

    // === Player intents ===

    /// Move (or push). Returns false if the rules reject it.
    pub fn move_player(&mut self, d_row: i32, d_col: i32) -> bool {
        let before = self.puzzle.grid().boxes().clone();
        let was_won = self.puzzle.is_won();
        if !self.puzzle.move_player(d_row, d_col) {
            return false;
        }

        let after = self.puzzle.grid().boxes();
        if let (Some(from), Some(to)) = (before.difference(after).next(), after.difference(&before).next()) {
            self.events.push(GameEvent::BoxMoved { from: *from, to: *to });
            for monster_id in self.monsters.retarget_blocked(self.puzzle.grid()) {
                self.events.push(GameEvent::MonsterTeleported { monster_id });
            }
        }
        if !was_won && self.puzzle.is_won() {
            self.events.push(GameEvent::Won {
                elapsed_ms: self.puzzle.timer().elapsed_ms(),
            });
        }
        true
    }

    /// Shoot along the facing direction. Needs ammo of that kind.
    pub fn fire(&mut self, kind: BulletKind) -> bool {
        if self.puzzle.is_won() || !self.puzzle.player_mut().ammo.take(kind) {
            return false;
        }
        let player = self.puzzle.player();
        let origin = self.geometry.to_screen(player.position.as_vec2());
        let bullet_id = self.bullets.fire(origin, Aim::Along(player.facing.unit()), kind);
        self.events.push(GameEvent::Fired { bullet_id, kind });
        true
    }

    pub fn toggle_build_mode(&mut self) -> bool {
        self.puzzle.toggle_build_mode()
    }

    /// Wall off the cell ahead. Pickups and monsters block the build.
    pub fn build_wall_in_front(&mut self) -> bool {
        let ammo = &self.ammo_pickups;
        let lives = &self.lives_pickups;
        let monsters = &self.monsters;
        let built = self
            .puzzle
            .build_wall_in_front(|cell| ammo.occupies(cell) || lives.occupies(cell) || monsters.occupies(cell));
        if built {
            let player = self.puzzle.player();
            self.events.push(GameEvent::WallBuilt {
                cell: player.position.step(player.facing),
            });
        }
        built
    }

    /// Back to the load-time grid; monsters respawn, pickups are not re-rolled
    pub fn reset(&mut self) {
        self.puzzle.reset();
        self.monsters.respawn(self.puzzle.grid());
        self.bullets.clear();
        self.particles.clear();
        self.events.push(GameEvent::LevelReset);
        log::info!("Level {} reset", self.level_id);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.puzzle.timer_mut().set_paused(paused);
    }

    // === Per-tick passes (called by `tick`) ===

    pub(crate) fn update_monsters(&mut self, dt_ms: f32) -> bool {
        let update = self.monsters.update(dt_ms, self.puzzle.grid());
        for monster_id in update.teleported {
            self.events.push(GameEvent::MonsterTeleported { monster_id });
        }
        update.changed
    }

    pub(crate) fn update_projectiles(&mut self, dt_ms: f32) -> bool {
        let moved = self.bullets.update(dt_ms, self.puzzle.grid(), &self.geometry);
        let targets = self.monsters.screen_positions(&self.geometry);
        let hits = self.bullets.collide(&targets);
        let hit_any = !hits.is_empty();
        for hit in hits {
            self.resolve_hit(hit);
        }
        moved || hit_any
    }

    fn resolve_hit(&mut self, hit: BulletHit) {
        match hit.kind {
            BulletKind::Normal | BulletKind::Pierce => {
                if let Some(monster) = self.monsters.kill(hit.monster_id) {
                    log::debug!("Monster {} killed by bullet {}", monster.id, hit.bullet_id);
                    let at = self.geometry.to_screen(monster.pos);
                    self.particles.spawn(at, &mut self.rng);
                    self.events.push(GameEvent::MonsterKilled {
                        monster_id: monster.id,
                    });
                }
            }
            BulletKind::Stun => {
                if self.monsters.stun(hit.monster_id, self.config.stun_duration_ms) {
                    self.particles.spawn(hit.pos, &mut self.rng);
                    self.events.push(GameEvent::MonsterStunned {
                        monster_id: hit.monster_id,
                    });
                }
            }
        }
    }

    pub(crate) fn collect_pickups(&mut self) -> bool {
        let cell = self.puzzle.player_position();
        let mut collected = self.ammo_pickups.collect(cell);
        collected.extend(self.lives_pickups.collect(cell));
        let changed = !collected.is_empty();

        let max_ammo = self.config.max_ammo;
        let max_lives = self.config.max_lives;
        for pickup in collected {
            let player = self.puzzle.player_mut();
            match pickup.kind {
                PickupKind::Ammo(kind) => {
                    player.ammo.add_clamped(kind, ammo_per_pickup(kind), &max_ammo)
                }
                PickupKind::Lives => player.lives = (player.lives + 1).min(max_lives),
            }
            log::debug!("Collected {:?} at {:?}", pickup.kind, pickup.cell);
            self.events.push(GameEvent::PickupCollected {
                cell: pickup.cell,
                kind: pickup.kind,
            });
        }
        changed
    }

    pub(crate) fn update_particles(&mut self, dt_ms: f32) -> bool {
        self.particles.update(dt_ms)
    }

    /// Report monster contact; the response is up to the consumer
    pub(crate) fn check_contacts(&mut self) {
        let cell = self.puzzle.player_position();
        let safe = self.puzzle.grid().is_safe_zone(cell);
        for monster_id in self.monsters.touching(cell) {
            self.events.push(GameEvent::PlayerTouched { monster_id, safe });
        }
    }

    pub(crate) fn advance_timer(&mut self, dt_ms: f32) {
        self.puzzle.advance_timer(dt_ms);
    }

    pub(crate) fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // === Read access ===

    pub fn level_id(&self) -> u32 {
        self.level_id
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn geometry(&self) -> &BoardGeometry {
        &self.geometry
    }

    pub fn puzzle(&self) -> &PuzzleState {
        &self.puzzle
    }

    pub fn monsters(&self) -> &MonsterSystem {
        &self.monsters
    }

    pub fn bullets(&self) -> &ProjectileSystem {
        &self.bullets
    }

    pub fn ammo_pickups(&self) -> &PickupSystem {
        &self.ammo_pickups
    }

    pub fn lives_pickups(&self) -> &PickupSystem {
        &self.lives_pickups
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    #[cfg(test)]
    pub(crate) fn monsters_mut(&mut self) -> &mut MonsterSystem {
        &mut self.monsters
    }

    #[cfg(test)]
    pub(crate) fn place_pickup(&mut self, cell: Cell, kind: PickupKind) -> u32 {
        match kind {
            PickupKind::Ammo(_) => self.ammo_pickups.place(cell, kind),
            PickupKind::Lives => self.lives_pickups.place(cell, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::{BuiltinLevels, MonsterDef};
    use crate::sim::{Direction, MonsterKind};

    fn level(template: &[&str], monsters: Vec<MonsterDef>) -> LevelDef {
        LevelDef {
            id: 1,
            name: "test".into(),
            template: template.iter().map(|s| s.to_string()).collect(),
            monsters,
            ammo_pickups: 0,
            lives_pickups: 0,
        }
    }

    #[test]
    fn test_builtin_sessions_load() {
        let config = SimConfig::default();
        for id in 1..=3 {
            let session = GameSession::from_provider(&BuiltinLevels, id, &config).unwrap();
            assert_eq!(session.level_id(), id);
            assert!(!session.monsters().monsters().is_empty());
        }
        assert!(matches!(
            GameSession::from_provider(&BuiltinLevels, 42, &config),
            Err(LevelError::UnknownLevel(42))
        ));
    }

    #[test]
    fn test_missing_player_propagates() {
        let def = level(&["#####", "#.BG#", "#####"], vec![]);
        assert!(matches!(
            GameSession::new(&def, &SimConfig::default()),
            Err(LevelError::MissingPlayer)
        ));
    }

    #[test]
    fn test_spawned_pickups_avoid_occupied_cells() {
        let mut def = level(
            &["########", "#@....1#", "#.B..G.#", "#......#", "########"],
            vec![MonsterDef::new(MonsterKind::Random, 3, 3)],
        );
        def.ammo_pickups = 5;
        def.lives_pickups = 5;
        let session = GameSession::new(&def, &SimConfig::default()).unwrap();
        let ammo: Vec<Cell> = session.ammo_pickups().cells().collect();
        let lives: Vec<Cell> = session.lives_pickups().cells().collect();
        assert_eq!(ammo.len(), 6);
        assert_eq!(lives.len(), 5);
        let all: BTreeSet<Cell> = ammo.iter().chain(lives.iter()).copied().collect();
        assert_eq!(all.len(), 11);
        assert!(!all.contains(&Cell::new(1, 1)));
        assert!(!all.contains(&Cell::new(3, 3)));
        assert!(!all.contains(&Cell::new(2, 2)));
    }

    #[test]
    fn test_fire_consumes_ammo() {
        let def = level(&["#######", "#@....#", "#######"], vec![]);
        let mut config = SimConfig::default();
        config.starting_ammo.stun = 1;
        let mut session = GameSession::new(&def, &config).unwrap();
        session.move_player(0, 1);
        assert!(session.fire(BulletKind::Stun));
        assert!(!session.fire(BulletKind::Stun));
        assert_eq!(session.puzzle().player().ammo.stun, 0);
        let bullet = &session.bullets().bullets()[0];
        assert_eq!(bullet.facing, Direction::Right);
    }

    #[test]
    fn test_collect_ammo_and_life_clamped() {
        let def = level(&["#######", "#@12LL#", "#######"], vec![]);
        let mut config = SimConfig::default();
        config.starting_lives = 4;
        config.starting_ammo.pierce = 5;
        let mut session = GameSession::new(&def, &config).unwrap();

        session.move_player(0, 1);
        assert!(session.collect_pickups());
        assert_eq!(session.puzzle().player().ammo.normal, 15);
        session.move_player(0, 1);
        session.collect_pickups();
        assert_eq!(session.puzzle().player().ammo.pierce, 5);
        session.move_player(0, 1);
        session.collect_pickups();
        session.move_player(0, 1);
        session.collect_pickups();
        assert_eq!(session.puzzle().player().lives, 5);
        assert!(session.ammo_pickups().pickups().is_empty());
        assert!(session.lives_pickups().pickups().is_empty());
    }

    #[test]
    fn test_build_blocked_by_pickup_and_monster() {
        let def = level(
            &["#######", "#@1...#", "#.....#", "#######"],
            vec![MonsterDef::new(MonsterKind::Random, 2, 1)],
        );
        let mut session = GameSession::new(&def, &SimConfig::default()).unwrap();
        session.toggle_build_mode();
        session.puzzle.player_mut().facing = Direction::Right;
        assert!(!session.build_wall_in_front());
        session.puzzle.player_mut().facing = Direction::Down;
        assert!(!session.build_wall_in_front());
        session.monsters_mut().kill(1);
        assert!(session.build_wall_in_front());
        assert!(session.puzzle().grid().is_wall(Cell::new(2, 1)));
    }

    #[test]
    fn test_reset_respawns_monsters_keeps_pickups() {
        let def = level(
            &["#######", "#@.1..#", "#.....#", "#######"],
            vec![MonsterDef::new(MonsterKind::Random, 2, 4)],
        );
        let mut session = GameSession::new(&def, &SimConfig::default()).unwrap();
        session.monsters_mut().kill(1);
        session.move_player(0, 1);
        session.move_player(0, 1);
        session.collect_pickups();
        assert!(session.ammo_pickups().pickups().is_empty());

        session.reset();
        assert_eq!(session.monsters().monsters().len(), 1);
        assert_eq!(session.puzzle().player_position(), Cell::new(1, 1));
        assert!(session.ammo_pickups().pickups().is_empty());
        assert!(session.take_events().contains(&GameEvent::LevelReset));
    }
}
