//! Scheduled work of a room: tick, broadcasts and timers

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::trace;

use crate::game::snapshot::SnapshotBuilder;
use crate::game::{InputBuffer, RoomCode, Simulation};
use crate::protocol::arena_topic;
use crate::util::time::{unix_millis, Timer};

use super::manager::EngineStats;
use super::publisher::FramePublisher;

/// Live simulation of a room that is playing
pub(crate) struct ArenaHandle {
    pub code: RoomCode,
    pub sim: RwLock<Simulation>,
    /// Same latches the simulation reads, reachable without the lock
    pub inputs: Arc<InputBuffer>,
    live: AtomicBool,
    snapshots: SnapshotBuilder,
}

impl ArenaHandle {
    pub fn new(code: RoomCode, sim: Simulation) -> Self {
        let inputs = sim.inputs().clone();
        Self {
            snapshots: SnapshotBuilder::new(code.clone()),
            code,
            sim: RwLock::new(sim),
            inputs,
            live: AtomicBool::new(true),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Later ticks and broadcasts become no-ops
    pub fn halt(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Every task scheduled for one room. Dropping the set aborts them all.
#[derive(Default)]
pub(crate) struct RoomTasks {
    set: JoinSet<()>,
}

impl RoomTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.set.spawn(task);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum FrameKind {
    Position,
    Paint,
}

/// Fixed-step simulation loop
pub(crate) async fn run_ticks(arena: Arc<ArenaHandle>, tick: Duration, stats: Arc<EngineStats>) {
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !arena.is_live() {
            break;
        }

        let timer = Timer::new();
        let report = arena.sim.write().step(unix_millis());
        stats.record_tick(timer.elapsed_micros());

        if !report.credits.is_empty() || !report.debits.is_empty() {
            trace!(
                room = %arena.code,
                tick = report.tick,
                credits = report.credits.len(),
                debits = report.debits.len(),
                "Score change"
            );
        }
    }
}

/// Periodic read-only snapshot publisher
pub(crate) async fn run_broadcast(
    arena: Arc<ArenaHandle>,
    period: Duration,
    kind: FrameKind,
    publisher: Arc<dyn FramePublisher>,
) {
    let topic = arena_topic(&arena.code);
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !arena.is_live() {
            break;
        }

        // Lock only while copying, never while publishing
        let frame = {
            let sim = arena.sim.read();
            match kind {
                FrameKind::Position => arena.snapshots.position_frame(&sim),
                FrameKind::Paint => arena.snapshots.paint_frame(&sim),
            }
        };
        publisher.publish(&topic, frame);
    }
}
