//! Sokoban Arena headless driver
//!
//! Runs a level on the background loop, feeds it a short scripted walk and
//! logs what the snapshots report.
//!
//! Usage: `sokoban-arena [LEVEL_ID] [CONFIG.json]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = native::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Hosts embed the library directly on the web
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::error::Error;
    use std::thread;
    use std::time::Duration;

    use sokoban_arena::sim::{BulletKind, GameSession, Intent};
    use sokoban_arena::{BuiltinLevels, LevelProvider, SimConfig, SimulationLoop};

    const SCRIPT: [Intent; 6] = [
        Intent::Move { d_row: 0, d_col: 1 },
        Intent::Move { d_row: 1, d_col: 0 },
        Intent::Fire(BulletKind::Normal),
        Intent::Move { d_row: 0, d_col: 1 },
        Intent::Move { d_row: 0, d_col: 1 },
        Intent::Fire(BulletKind::Pierce),
    ];

    pub fn run() -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args().skip(1);
        let level_id = match args.next() {
            Some(arg) => arg.parse::<u32>()?,
            None => 1,
        };
        let config = match args.next() {
            Some(path) => SimConfig::load(&path)?,
            None => SimConfig::default(),
        }
        .sanitized();

        log::info!(
            "Sokoban Arena starting (level {} of {})",
            level_id,
            BuiltinLevels.level_count()
        );
        let session = GameSession::from_provider(&BuiltinLevels, level_id, &config)?;
        let mut sim = SimulationLoop::new(session);
        let handle = sim.handle();
        sim.start()?;

        for intent in SCRIPT {
            handle.send(intent);
            thread::sleep(Duration::from_millis(150));
            for event in handle.take_events() {
                log::info!("event: {:?}", event);
            }
            if handle.take_dirty() {
                let snap = handle.snapshot();
                if let Some(player) = &snap.player {
                    log::info!(
                        "v{} player at ({}, {}) ammo {}/{}/{} monsters {} progress {:.0}%",
                        snap.version,
                        player.cell.row,
                        player.cell.col,
                        player.ammo.normal,
                        player.ammo.pierce,
                        player.ammo.stun,
                        snap.monsters.len(),
                        snap.progress_percent
                    );
                }
            }
        }

        sim.stop();
        if let Some(session) = sim.session() {
            log::info!(
                "Stopped after {} ticks, {} ms on the clock",
                session.time_ticks,
                session.puzzle().timer().elapsed_ms()
            );
        }
        Ok(())
    }
}
