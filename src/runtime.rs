//! Background simulation loop
//!
//! A single worker thread owns the `GameSession` and is its only writer.
//! Input reaches it as `Intent`s over a channel; readers see immutable
//! `Snapshot`s swapped in behind a lock, plus a dirty flag that the render
//! side clears when it redraws.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::RuntimeError;
use crate::sim::{GameEvent, GameSession, Intent, Snapshot, TickInput, tick};

/// Longest step fed to the simulation after a stall
const MAX_FRAME_MS: f32 = 250.0;

/// Undrained events kept for `SimHandle::take_events` (oldest dropped first)
const MAX_PENDING_EVENTS: usize = 1024;

static SNAPSHOT_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_snapshot_lock_poison_once(operation: &'static str) {
    if SNAPSHOT_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        log::warn!("snapshot lock poisoned during {operation}; recovered inner value");
    }
}

#[derive(Debug)]
struct Shared {
    snapshot: RwLock<Arc<Snapshot>>,
    version: AtomicU64,
    dirty: AtomicBool,
    running: AtomicBool,
    paused: AtomicBool,
    pending_events: Mutex<VecDeque<GameEvent>>,
}

impl Shared {
    fn publish(&self, session: &GameSession, events: Vec<GameEvent>) {
        if !events.is_empty() {
            let mut pending = match self.pending_events.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    warn_snapshot_lock_poison_once("queue events");
                    poisoned.into_inner()
                }
            };
            pending.extend(events.iter().copied());
            let overflow = pending.len().saturating_sub(MAX_PENDING_EVENTS);
            if overflow > 0 {
                pending.drain(..overflow);
                log::debug!("Dropped {overflow} undrained events");
            }
        }

        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot::capture(session, version, events));
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_snapshot_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
        self.dirty.store(true, Ordering::Release);
    }
}

/// Cheap cloneable access to a running loop
#[derive(Debug, Clone)]
pub struct SimHandle {
    intents: Sender<Intent>,
    shared: Arc<Shared>,
}

impl SimHandle {
    /// Queue an intent for the next tick. Never blocks.
    pub fn send(&self, intent: Intent) -> bool {
        self.intents.send(intent).is_ok()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.shared.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                warn_snapshot_lock_poison_once("read");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    /// Drain every event published since the last call.
    ///
    /// Unlike `Snapshot::events`, which only holds the latest tick's events,
    /// nothing is lost between reads here.
    pub fn take_events(&self) -> Vec<GameEvent> {
        let mut pending = match self.shared.pending_events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_snapshot_lock_poison_once("drain events");
                poisoned.into_inner()
            }
        };
        pending.drain(..).collect()
    }

    /// Returns true once per published change
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }
}

type WorkerOutput = (GameSession, Receiver<Intent>);

/// Owns the session while stopped and the worker while running
#[derive(Debug)]
pub struct SimulationLoop {
    session: Option<GameSession>,
    intents: Option<Receiver<Intent>>,
    handle: SimHandle,
    worker: Option<JoinHandle<WorkerOutput>>,
    tick_duration: Duration,
}

impl SimulationLoop {
    pub fn new(session: GameSession) -> Self {
        let tick_duration = Duration::from_secs_f32(session.config().tick_ms() / 1000.0);
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            version: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(session.puzzle().timer().is_paused()),
            pending_events: Mutex::new(VecDeque::new()),
        });
        shared.publish(&session, Vec::new());

        Self {
            session: Some(session),
            intents: Some(receiver),
            handle: SimHandle {
                intents: sender,
                shared,
            },
            worker: None,
            tick_duration,
        }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// Spawn the worker. Returns Ok(false) if it is already running.
    pub fn start(&mut self) -> Result<bool, RuntimeError> {
        if self.worker.is_some() {
            return Ok(false);
        }
        let (Some(session), Some(intents)) = (self.session.take(), self.intents.take()) else {
            return Err(RuntimeError::NoSession);
        };

        let shared = Arc::clone(&self.handle.shared);
        let tick_duration = self.tick_duration;
        shared.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("sim-worker".into())
            .spawn(move || run_worker(session, intents, shared, tick_duration));

        match spawned {
            Ok(worker) => {
                log::info!("Simulation started ({:?} per tick)", self.tick_duration);
                self.worker = Some(worker);
                Ok(true)
            }
            Err(err) => {
                self.handle.shared.running.store(false, Ordering::Release);
                Err(RuntimeError::Spawn(err))
            }
        }
    }

    /// Stop and join the worker. Returns false if it was not running.
    ///
    /// No tick runs and nothing is published once this returns.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        self.handle.shared.running.store(false, Ordering::Release);
        match worker.join() {
            Ok((session, intents)) => {
                log::info!("Simulation stopped at tick {}", session.time_ticks);
                self.session = Some(session);
                self.intents = Some(intents);
            }
            Err(_) => log::error!("Simulation worker panicked; session lost"),
        }
        true
    }

    /// Freeze ticking and the level clock. Returns false if already paused.
    pub fn pause(&mut self) -> bool {
        let changed = !self.handle.shared.paused.swap(true, Ordering::AcqRel);
        if changed {
            self.sync_stopped_session(true);
            log::info!("Simulation paused");
        }
        changed
    }

    /// Returns false if not paused.
    pub fn resume(&mut self) -> bool {
        let changed = self.handle.shared.paused.swap(false, Ordering::AcqRel);
        if changed {
            self.sync_stopped_session(false);
            log::info!("Simulation resumed");
        }
        changed
    }

    fn sync_stopped_session(&mut self, paused: bool) {
        if let Some(session) = self.session.as_mut() {
            session.set_paused(paused);
            self.handle.shared.publish(session, Vec::new());
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// The session, when the worker is not holding it
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    /// Stop and hand back the session
    pub fn into_session(mut self) -> Option<GameSession> {
        self.stop();
        self.session.take()
    }
}

impl Drop for SimulationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut session: GameSession,
    intents: Receiver<Intent>,
    shared: Arc<Shared>,
    tick_duration: Duration,
) -> WorkerOutput {
    let mut last_tick = Instant::now();
    let mut was_paused = session.puzzle().timer().is_paused();

    while shared.running.load(Ordering::Acquire) {
        let frame_start = Instant::now();
        let dt_ms = (frame_start.duration_since(last_tick).as_secs_f32() * 1000.0).min(MAX_FRAME_MS);
        last_tick = frame_start;

        let paused = shared.paused.load(Ordering::Acquire);
        if paused != was_paused {
            session.set_paused(paused);
            shared.publish(&session, Vec::new());
            was_paused = paused;
        }

        // Intents queue up while paused
        if !paused {
            let input = TickInput {
                intents: intents.try_iter().collect(),
            };
            let report = tick(&mut session, &input, dt_ms);
            if report.changed {
                shared.publish(&session, report.events);
            }
        }

        let sleep = compute_cap_sleep(frame_start.elapsed(), tick_duration);
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }

    (session, intents)
}

fn compute_cap_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::levels::LevelDef;
    use crate::sim::Cell;

    fn new_loop() -> SimulationLoop {
        let def = LevelDef {
            id: 1,
            name: "loop".into(),
            template: ["######", "#@...#", "#.B.G#", "######"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            monsters: Vec::new(),
            ammo_pickups: 0,
            lives_pickups: 0,
        };
        let config = SimConfig {
            target_tps: 200,
            ..SimConfig::default()
        };
        SimulationLoop::new(GameSession::new(&def, &config).unwrap())
    }

    fn wait_for(handle: &SimHandle, pred: impl Fn(&Snapshot) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if pred(handle.snapshot().as_ref()) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_compute_cap_sleep() {
        let target = Duration::from_millis(16);
        assert_eq!(compute_cap_sleep(Duration::from_millis(20), target), Duration::ZERO);
        assert_eq!(compute_cap_sleep(Duration::from_millis(6), target), Duration::from_millis(10));
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut sim = new_loop();
        assert!(sim.session().is_some());
        assert!(sim.start().unwrap());
        assert!(!sim.start().unwrap());
        assert!(sim.is_running());
        assert!(sim.session().is_none());
        assert!(sim.stop());
        assert!(!sim.stop());
        assert!(sim.session().is_some());
        // Restartable
        assert!(sim.start().unwrap());
        assert!(sim.stop());
    }

    #[test]
    fn test_intents_reach_the_session() {
        let mut sim = new_loop();
        let handle = sim.handle();
        sim.start().unwrap();
        assert!(handle.send(Intent::Move { d_row: 0, d_col: 1 }));
        assert!(wait_for(&handle, |s| s.player.as_ref().map(|p| p.cell) == Some(Cell::new(1, 2))));
        sim.stop();
        assert_eq!(sim.session().unwrap().puzzle().player_position(), Cell::new(1, 2));
    }

    #[test]
    fn test_no_publish_after_stop() {
        let mut sim = new_loop();
        let handle = sim.handle();
        sim.start().unwrap();
        handle.send(Intent::Move { d_row: 0, d_col: 1 });
        assert!(wait_for(&handle, |s| s.version > 1));
        sim.stop();

        let version = handle.version();
        handle.send(Intent::Move { d_row: 0, d_col: 1 });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.version(), version);
        assert_eq!(sim.session().unwrap().puzzle().player_position(), Cell::new(1, 2));
    }

    #[test]
    fn test_pause_holds_intents_until_resume() {
        let mut sim = new_loop();
        let handle = sim.handle();
        sim.start().unwrap();
        assert!(sim.pause());
        assert!(!sim.pause());
        assert!(wait_for(&handle, |s| s.paused));

        let version = handle.version();
        handle.send(Intent::Move { d_row: 0, d_col: 1 });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.version(), version);

        assert!(sim.resume());
        assert!(!sim.resume());
        assert!(wait_for(&handle, |s| !s.paused
            && s.player.as_ref().map(|p| p.cell) == Some(Cell::new(1, 2))));
    }

    #[test]
    fn test_events_survive_slow_reader() {
        let def = LevelDef {
            id: 2,
            name: "pickups".into(),
            template: ["#######", "#@1111#", "#######"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            monsters: Vec::new(),
            ammo_pickups: 0,
            lives_pickups: 0,
        };
        let config = SimConfig {
            target_tps: 200,
            ..SimConfig::default()
        };
        let mut sim = SimulationLoop::new(GameSession::new(&def, &config).unwrap());
        let handle = sim.handle();
        sim.start().unwrap();
        // One step per tick so every pickup is walked over
        for col in 2..=5 {
            handle.send(Intent::Move { d_row: 0, d_col: 1 });
            assert!(wait_for(&handle, |s| s.player.as_ref().map(|p| p.cell) == Some(Cell::new(1, col))));
        }
        thread::sleep(Duration::from_millis(100));
        sim.stop();

        let collected = |events: &[GameEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::PickupCollected { .. }))
                .count()
        };
        assert_eq!(collected(&handle.take_events()), 4);
        assert!(handle.take_events().is_empty());
    }

    #[test]
    fn test_dirty_flag_clears_on_take() {
        let sim = new_loop();
        let handle = sim.handle();
        assert!(handle.take_dirty());
        assert!(!handle.take_dirty());
        assert_eq!(handle.version(), 1);
        assert_eq!(handle.snapshot().level_id, 1);
    }
}
