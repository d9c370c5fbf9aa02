//! Level descriptors
//!
//! Levels reach the simulation through a `LevelProvider`, either the
//! built-in set or one loaded by the host (descriptors are plain serde data).

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::MONSTER_DEFAULT_SPEED;
use crate::error::LevelError;
use crate::sim::{Cell, Direction, MonsterKind};

/// Where and how a monster starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterDef {
    pub kind: MonsterKind,
    pub spawn: Cell,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Patrol/Circle route
    #[serde(default)]
    pub waypoints: Vec<Cell>,
    /// Straight/Bounce heading (initial facing for the rest)
    #[serde(default)]
    pub direction: Direction,
}

fn default_speed() -> f32 {
    MONSTER_DEFAULT_SPEED
}

impl MonsterDef {
    pub fn new(kind: MonsterKind, row: i32, col: i32) -> Self {
        Self {
            kind,
            spawn: Cell::new(row, col),
            speed: MONSTER_DEFAULT_SPEED,
            waypoints: Vec::new(),
            direction: Direction::Down,
        }
    }

    pub fn heading(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn route(mut self, waypoints: &[(i32, i32)]) -> Self {
        self.waypoints = waypoints.iter().map(|&(r, c)| Cell::new(r, c)).collect();
        self
    }
}

/// A playable level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: u32,
    pub name: String,
    pub template: Vec<String>,
    #[serde(default)]
    pub monsters: Vec<MonsterDef>,
    /// Extra ammo pickups scattered at level start
    #[serde(default)]
    pub ammo_pickups: usize,
    /// Extra lives pickups scattered at level start
    #[serde(default)]
    pub lives_pickups: usize,
}

/// Read-only source of level descriptors
pub trait LevelProvider {
    fn level(&self, id: u32) -> Option<LevelDef>;
    fn level_count(&self) -> u32;

    fn require(&self, id: u32) -> Result<LevelDef, LevelError> {
        self.level(id).ok_or(LevelError::UnknownLevel(id))
    }
}

/// Hand-authored levels shipped with the game (ids start at 1)
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLevels;

impl LevelProvider for BuiltinLevels {
    fn level(&self, id: u32) -> Option<LevelDef> {
        let def = match id {
            1 => LevelDef {
                id,
                name: "Warehouse".into(),
                template: lines(&[
                    "##########",
                    "#@...S...#",
                    "#..B...G.#",
                    "#........#",
                    "#.1..B.G.#",
                    "#........#",
                    "#L.......#",
                    "##########",
                ]),
                monsters: vec![
                    MonsterDef::new(MonsterKind::Patrol, 5, 2).route(&[(5, 2), (5, 8)]),
                    MonsterDef::new(MonsterKind::Straight, 3, 1).heading(Direction::Right),
                ],
                ammo_pickups: 2,
                lives_pickups: 0,
            },
            2 => LevelDef {
                id,
                name: "Crossfire".into(),
                template: lines(&[
                    "############",
                    "#@..#......#",
                    "#.B.#..G...#",
                    "#...B...S..#",
                    "#...#..G...#",
                    "#2.......3.#",
                    "############",
                ]),
                monsters: vec![
                    MonsterDef::new(MonsterKind::Circle, 1, 6)
                        .route(&[(1, 6), (1, 10), (4, 10), (4, 6)]),
                    MonsterDef::new(MonsterKind::Random, 5, 5),
                    MonsterDef::new(MonsterKind::Bounce, 2, 1).heading(Direction::Down),
                ],
                ammo_pickups: 3,
                lives_pickups: 1,
            },
            3 => LevelDef {
                id,
                name: "Gauntlet".into(),
                template: lines(&[
                    "##############",
                    "#@.....#.....#",
                    "#.B..B.#..GG.#",
                    "#......B.....#",
                    "#SS....#.....#",
                    "#......#..L..#",
                    "##############",
                ]),
                monsters: vec![
                    MonsterDef::new(MonsterKind::Chase, 5, 3),
                    MonsterDef::new(MonsterKind::Straight, 1, 8).heading(Direction::Down),
                    MonsterDef::new(MonsterKind::Random, 3, 11),
                ],
                ammo_pickups: 4,
                lives_pickups: 1,
            },
            _ => return None,
        };
        Some(def)
    }

    fn level_count(&self) -> u32 {
        3
    }
}

fn lines(rows: &[&str]) -> Vec<String> {
    rows.iter().map(|r| r.to_string()).collect()
}

/// Share of interior cells turned into walls
const GENERATED_WALL_RATIO: f32 = 0.1;

/// Build a random walled level.
///
/// Boxes go on cells at least one step from the border so they can be pushed
/// in every direction; interior walls never touch a box.
pub fn generate_level(
    id: u32,
    rows: usize,
    cols: usize,
    boxes: usize,
    monsters: usize,
    seed: u64,
) -> Result<LevelDef, LevelError> {
    if rows < 5 || cols < 5 {
        return Err(LevelError::InvalidDimensions { rows, cols });
    }
    if boxes == 0 {
        return Err(LevelError::NoGoals);
    }
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut map = vec![vec!['#'; cols]; rows];
    for row in map.iter_mut().take(rows - 1).skip(1) {
        for ch in row.iter_mut().take(cols - 1).skip(1) {
            *ch = '.';
        }
    }

    // Box cells first, from the pushable core
    let mut core: Vec<Cell> = (2..rows as i32 - 2)
        .flat_map(|r| (2..cols as i32 - 2).map(move |c| Cell::new(r, c)))
        .collect();
    if boxes > core.len() {
        return Err(LevelError::InsufficientFreeCells {
            requested: boxes,
            available: core.len(),
        });
    }
    core.shuffle(&mut rng);
    let box_cells: Vec<Cell> = core.into_iter().take(boxes).collect();

    let mut free: Vec<Cell> = (1..rows as i32 - 1)
        .flat_map(|r| (1..cols as i32 - 1).map(move |c| Cell::new(r, c)))
        .filter(|c| !box_cells.contains(c))
        .collect();
    // player + one goal per box + monster spawns
    let needed = 1 + boxes + monsters;
    if needed > free.len() {
        return Err(LevelError::InsufficientFreeCells {
            requested: needed + boxes,
            available: free.len() + boxes,
        });
    }
    free.shuffle(&mut rng);
    let mut free = free.into_iter();

    let mut set = |cell: Cell, ch: char| map[cell.row as usize][cell.col as usize] = ch;
    for &cell in &box_cells {
        set(cell, 'B');
    }
    let player = free.next().ok_or(LevelError::MissingPlayer)?;
    set(player, '@');
    for cell in free.by_ref().take(boxes) {
        set(cell, 'G');
    }
    let spawns: Vec<Cell> = free.by_ref().take(monsters).collect();

    // Safe zone around the start
    for dir in Direction::ALL {
        let near = player.step(dir);
        if map[near.row as usize][near.col as usize] == '.' {
            map[near.row as usize][near.col as usize] = 'S';
        }
    }

    let touches_box =
        |cell: Cell| Direction::ALL.iter().any(|d| box_cells.contains(&cell.step(*d)));
    let wall_budget = ((rows - 2) * (cols - 2)) as f32 * GENERATED_WALL_RATIO;
    let mut walls = 0;
    for cell in free {
        if walls as f32 >= wall_budget {
            break;
        }
        if map[cell.row as usize][cell.col as usize] == '.'
            && !touches_box(cell)
            && rng.random_bool(0.5)
        {
            map[cell.row as usize][cell.col as usize] = '#';
            walls += 1;
        }
    }

    let monsters = spawns
        .into_iter()
        .map(|cell| MonsterDef::new(MonsterKind::Random, cell.row, cell.col))
        .collect();
    log::info!("Generated level {}: {}x{}, {} boxes, seed {}", id, rows, cols, boxes, seed);

    Ok(LevelDef {
        id,
        name: format!("Generated #{id}"),
        template: map.into_iter().map(|row| row.into_iter().collect()).collect(),
        monsters,
        ammo_pickups: 3,
        lives_pickups: 1,
    })
}
