//! Fixed timestep simulation tick
//!
//! One pass, always in this order, so AI and collision see the post-input
//! world:
//! 1. player intents
//! 2. monster AI and movement
//! 3. bullet movement and hits
//! 4. pickup collection
//! 5. particles
//! 6. contact query and level clock

use serde::{Deserialize, Serialize};

use super::projectile::BulletKind;
use super::state::{GameEvent, GameSession};

/// A request from the input side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Move { d_row: i32, d_col: i32 },
    Fire(BulletKind),
    ToggleBuildMode,
    BuildWall,
    Reset,
}

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub intents: Vec<Intent>,
}

/// What a tick did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Anything the renderer shows changed
    pub changed: bool,
    pub events: Vec<GameEvent>,
}

/// Apply one intent. Returns true if it changed state.
pub fn apply_intent(session: &mut GameSession, intent: Intent) -> bool {
    match intent {
        Intent::Move { d_row, d_col } => {
            let facing = session.puzzle().player_direction();
            let moved = session.move_player(d_row, d_col);
            moved || facing != session.puzzle().player_direction()
        }
        Intent::Fire(kind) => session.fire(kind),
        Intent::ToggleBuildMode => {
            session.toggle_build_mode();
            true
        }
        Intent::BuildWall => session.build_wall_in_front(),
        Intent::Reset => {
            session.reset();
            true
        }
    }
}

/// Advance the session by `dt_ms`
pub fn tick(session: &mut GameSession, input: &TickInput, dt_ms: f32) -> TickReport {
    session.time_ticks += 1;

    let mut changed = false;
    for intent in &input.intents {
        changed |= apply_intent(session, *intent);
    }

    changed |= session.update_monsters(dt_ms);
    changed |= session.update_projectiles(dt_ms);
    changed |= session.collect_pickups();
    changed |= session.update_particles(dt_ms);
    session.check_contacts();

    let elapsed_before = session.puzzle().timer().elapsed_ms() / 1000;
    session.advance_timer(dt_ms);
    // Whole-second clock changes are visible to the HUD
    changed |= session.puzzle().timer().elapsed_ms() / 1000 != elapsed_before;

    let events = session.take_events();
    changed |= !events.is_empty();
    TickReport { changed, events }
}
