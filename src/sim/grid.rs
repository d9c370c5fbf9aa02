//! Tile grid
//!
//! Two layers:
//! - terrain: Wall/Floor/Goal/SafeZone, fixed once the level is parsed
//! - occupancy: box positions and player-built walls, mutated by validated moves
//!
//! The player is never written into the grid; `PuzzleState` tracks it.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::LevelError;
use crate::sim::projectile::BulletKind;

/// A grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Neighbour one step along `dir`
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let (dr, dc) = dir.delta();
        Self::new(self.row + dr, self.col + dc)
    }

    /// Continuous position (x = col, y = row)
    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.col as f32, self.row as f32)
    }
}

/// Facing / travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// (dRow, dCol)
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    /// Only the four cardinal unit deltas map to a direction
    pub fn from_delta(d_row: i32, d_col: i32) -> Option<Self> {
        match (d_row, d_col) {
            (-1, 0) => Some(Direction::Up),
            (1, 0) => Some(Direction::Down),
            (0, -1) => Some(Direction::Left),
            (0, 1) => Some(Direction::Right),
            _ => None,
        }
    }

    /// Dominant axis of a vector (x = col/right, y = row/down).
    /// Ties go to the horizontal axis; a zero vector keeps `fallback`.
    pub fn from_vector(v: Vec2, fallback: Direction) -> Self {
        if v.x == 0.0 && v.y == 0.0 {
            return fallback;
        }
        if v.x.abs() >= v.y.abs() {
            if v.x > 0.0 { Direction::Right } else { Direction::Left }
        } else if v.y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    /// Unit vector in screen/grid space
    pub fn unit(self) -> Vec2 {
        let (dr, dc) = self.delta();
        Vec2::new(dc as f32, dr as f32)
    }
}

/// Static terrain classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Wall,
    Floor,
    Goal,
    SafeZone,
}

/// What a cell shows once terrain and occupancy are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Wall,
    Floor,
    Box,
    Goal,
    SafeZone,
    AmmoPickup(BulletKind),
    LivesPickup,
}

/// Pickup marker found in a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupMarker {
    Ammo(BulletKind),
    Lives,
}

/// The grid world: immutable terrain plus box/built-wall occupancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridWorld {
    rows: usize,
    cols: usize,
    terrain: Vec<Terrain>,
    boxes: BTreeSet<Cell>,
    built_walls: BTreeSet<Cell>,
    goals: BTreeSet<Cell>,
    safe_zones: BTreeSet<Cell>,
}

/// Result of parsing a level template
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    pub grid: GridWorld,
    pub player_start: Cell,
    pub pickups: Vec<(Cell, PickupMarker)>,
}

impl GridWorld {
    /// Parse a textual template.
    ///
    /// `#` wall, `.` floor, `B` box, `G` goal, `S` safe zone, `@` player,
    /// `*` box on goal, `+` player on goal, `1`/`2`/`3` ammo (normal/pierce/stun),
    /// `L` lives. Short rows are padded with floor; unknown characters are floor.
    pub fn parse<S: AsRef<str>>(template: &[S]) -> Result<ParsedTemplate, LevelError> {
        let rows = template.len();
        let cols = template
            .iter()
            .map(|line| line.as_ref().chars().count())
            .max()
            .unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(LevelError::EmptyTemplate);
        }

        let mut grid = GridWorld {
            rows,
            cols,
            terrain: vec![Terrain::Floor; rows * cols],
            boxes: BTreeSet::new(),
            built_walls: BTreeSet::new(),
            goals: BTreeSet::new(),
            safe_zones: BTreeSet::new(),
        };
        let mut player_start: Option<Cell> = None;
        let mut pickups = Vec::new();

        for (r, line) in template.iter().enumerate() {
            for (c, ch) in line.as_ref().chars().enumerate() {
                let cell = Cell::new(r as i32, c as i32);
                let terrain = match ch {
                    '#' => Terrain::Wall,
                    'G' | '*' | '+' => Terrain::Goal,
                    'S' => Terrain::SafeZone,
                    _ => Terrain::Floor,
                };
                grid.terrain[r * cols + c] = terrain;
                match terrain {
                    Terrain::Goal => {
                        grid.goals.insert(cell);
                    }
                    Terrain::SafeZone => {
                        grid.safe_zones.insert(cell);
                    }
                    _ => {}
                }

                match ch {
                    'B' | '*' => {
                        grid.boxes.insert(cell);
                    }
                    '@' | '+' => {
                        if let Some(first) = player_start {
                            return Err(LevelError::MultiplePlayers {
                                first_row: first.row,
                                first_col: first.col,
                                second_row: cell.row,
                                second_col: cell.col,
                            });
                        }
                        player_start = Some(cell);
                    }
                    '1' => pickups.push((cell, PickupMarker::Ammo(BulletKind::Normal))),
                    '2' => pickups.push((cell, PickupMarker::Ammo(BulletKind::Pierce))),
                    '3' => pickups.push((cell, PickupMarker::Ammo(BulletKind::Stun))),
                    'L' => pickups.push((cell, PickupMarker::Lives)),
                    _ => {}
                }
            }
        }

        let player_start = player_start.ok_or(LevelError::MissingPlayer)?;
        Ok(ParsedTemplate {
            grid,
            player_start,
            pickups,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.rows
            && (cell.col as usize) < self.cols
    }

    /// Terrain at `cell` (None when out of bounds)
    pub fn terrain(&self, cell: Cell) -> Option<Terrain> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some(self.terrain[cell.row as usize * self.cols + cell.col as usize])
    }

    /// Wall terrain, player-built wall, or outside the grid
    pub fn is_wall(&self, cell: Cell) -> bool {
        match self.terrain(cell) {
            None | Some(Terrain::Wall) => true,
            Some(_) => self.built_walls.contains(&cell),
        }
    }

    pub fn has_box(&self, cell: Cell) -> bool {
        self.boxes.contains(&cell)
    }

    /// Monsters and boxes may enter: not a wall and not holding a box
    pub fn is_traversable(&self, cell: Cell) -> bool {
        !self.is_wall(cell) && !self.has_box(cell)
    }

    /// Blocks bullets: any wall or a box (out of bounds is handled by the bounds check)
    pub fn blocks_bullets(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && (self.is_wall(cell) || self.has_box(cell))
    }

    pub fn is_goal(&self, cell: Cell) -> bool {
        self.goals.contains(&cell)
    }

    pub fn is_safe_zone(&self, cell: Cell) -> bool {
        self.safe_zones.contains(&cell)
    }

    /// Terrain/occupancy view of a cell (pickups are layered on by the snapshot)
    pub fn cell_kind(&self, cell: Cell) -> CellKind {
        if self.is_wall(cell) {
            return CellKind::Wall;
        }
        if self.has_box(cell) {
            return CellKind::Box;
        }
        match self.terrain(cell) {
            Some(Terrain::Goal) => CellKind::Goal,
            Some(Terrain::SafeZone) => CellKind::SafeZone,
            _ => CellKind::Floor,
        }
    }

    /// Every cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows as i32).flat_map(move |r| (0..self.cols as i32).map(move |c| Cell::new(r, c)))
    }

    pub fn boxes(&self) -> &BTreeSet<Cell> {
        &self.boxes
    }

    pub fn goals(&self) -> &BTreeSet<Cell> {
        &self.goals
    }

    pub fn safe_zones(&self) -> &BTreeSet<Cell> {
        &self.safe_zones
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn boxes_on_goals(&self) -> usize {
        self.boxes.iter().filter(|b| self.goals.contains(b)).count()
    }

    /// True iff every goal holds a box
    pub fn all_goals_filled(&self) -> bool {
        self.goals.iter().all(|g| self.boxes.contains(g))
    }

    /// Move a box. Caller has validated both cells.
    pub(crate) fn move_box(&mut self, from: Cell, to: Cell) {
        if self.boxes.remove(&from) {
            self.boxes.insert(to);
        }
    }

    pub(crate) fn add_built_wall(&mut self, cell: Cell) {
        self.built_walls.insert(cell);
    }
}

/// Screen-space placement of the board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardGeometry {
    pub tile_size: f32,
    pub offset: Vec2,
    pub rows: usize,
    pub cols: usize,
}

impl BoardGeometry {
    pub fn new(grid: &GridWorld, tile_size: f32, offset: Vec2) -> Self {
        Self {
            tile_size,
            offset,
            rows: grid.rows(),
            cols: grid.cols(),
        }
    }

    /// Screen centre of a (possibly fractional) grid position
    pub fn to_screen(&self, grid_pos: Vec2) -> Vec2 {
        crate::cell_center(grid_pos.y, grid_pos.x, self.tile_size, self.offset)
    }

    /// Cell under a screen point
    pub fn to_cell(&self, screen: Vec2) -> Cell {
        let (row, col) = crate::screen_to_cell(screen, self.tile_size, self.offset);
        Cell::new(row, col)
    }

    /// Visible board expanded by `margin` on every side
    pub fn contains_with_margin(&self, screen: Vec2, margin: f32) -> bool {
        let min = self.offset - Vec2::splat(margin);
        let max = self.offset
            + Vec2::new(self.cols as f32, self.rows as f32) * self.tile_size
            + Vec2::splat(margin);
        screen.x >= min.x && screen.x <= max.x && screen.y >= min.y && screen.y <= max.y
    }
}
