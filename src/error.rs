//! Load-time failures
//!
//! Rule violations (illegal moves, blocked builds) are not errors and never
//! show up here; they are reported as `false` by the operation itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level template is empty")]
    EmptyTemplate,
    #[error("level template has no player start marker '@'")]
    MissingPlayer,
    #[error("level template has a second player start at ({second_row}, {second_col}); first at ({first_row}, {first_col})")]
    MultiplePlayers {
        first_row: i32,
        first_col: i32,
        second_row: i32,
        second_col: i32,
    },
    #[error("level dimensions {rows}x{cols} are too small")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("not enough free cells: requested {requested}, available {available}")]
    InsufficientFreeCells { requested: usize, available: usize },
    #[error("monster spawn ({row}, {col}) is not traversable")]
    MonsterSpawnBlocked { row: i32, col: i32 },
    #[error("generated level would have no boxes or goals")]
    NoGoals,
    #[error("unknown level id {0}")]
    UnknownLevel(u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker is not available (session lost after a worker panic)")]
    NoSession,
    #[error("failed to spawn simulation worker: {0}")]
    Spawn(#[from] std::io::Error),
}
