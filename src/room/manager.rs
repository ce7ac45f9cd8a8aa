//! Room registry and lifecycle transitions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::game::{ActorId, ArenaInput, RoomCode, Simulation};
use crate::protocol::{
    end_topic, standings, state_topic, ArenaConfig, Frame, PlayerInfo, RoomInfo, ScoreEntry, Standing,
};
use crate::store::ScoreSink;
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;

use super::publisher::FramePublisher;
use super::session::RoomSession;
use super::tasks::{run_broadcast, run_ticks, ArenaHandle, FrameKind, RoomTasks};
use super::RoomPhase;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;
const CODE_ATTEMPTS: usize = 5;

/// What happened to a submitted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Latched for the next tick
    Applied,
    /// Over the rate limit and discarded
    Dropped,
}

/// A join request from the lobby
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub player_id: ActorId,
    pub nickname: String,
    pub is_bot: bool,
}

impl JoinRequest {
    pub fn player(id: impl Into<ActorId>, nickname: impl Into<String>) -> Self {
        Self {
            player_id: id.into(),
            nickname: nickname.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<ActorId>, nickname: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::player(id, nickname)
        }
    }
}

/// Engine-wide counters
#[derive(Debug, Default)]
pub struct EngineStats {
    rooms_created: AtomicU64,
    rooms_started: AtomicU64,
    rooms_ended: AtomicU64,
    inputs_applied: AtomicU64,
    inputs_rate_limited: AtomicU64,
    sink_failures: AtomicU64,
    last_tick_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    pub rooms_created: u64,
    pub rooms_started: u64,
    pub rooms_ended: u64,
    pub inputs_applied: u64,
    pub inputs_rate_limited: u64,
    pub sink_failures: u64,
    pub last_tick_micros: u64,
}

impl EngineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self, micros: u64) {
        self.last_tick_micros.store(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            rooms_started: self.rooms_started.load(Ordering::Relaxed),
            rooms_ended: self.rooms_ended.load(Ordering::Relaxed),
            inputs_applied: self.inputs_applied.load(Ordering::Relaxed),
            inputs_rate_limited: self.inputs_rate_limited.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            last_tick_micros: self.last_tick_micros.load(Ordering::Relaxed),
        }
    }
}

/// One registered room.
///
/// Lock order: `session`, then `tasks`, then `arena`.
struct Room {
    session: Mutex<RoomSession>,
    tasks: Mutex<Option<RoomTasks>>,
    arena: RwLock<Option<Arc<ArenaHandle>>>,
}

impl Room {
    /// Abort all scheduled work and release the simulation, returning it
    /// so final scores can still be read. Safe to repeat.
    fn teardown(&self) -> Option<Arc<ArenaHandle>> {
        let tasks = self.tasks.lock().take();
        let arena = self.arena.write().take();
        if let Some(arena) = &arena {
            arena.halt();
        }
        drop(tasks);
        arena
    }

    fn live_scores(&self) -> Option<Vec<(ActorId, u32)>> {
        self.arena.read().as_ref().map(|a| a.sim.read().scores())
    }

    /// Freeze the live scores into the session and mark the round finished.
    /// The caller holds the session lock.
    fn close_round(&self, session: &mut RoomSession) -> (Vec<ScoreEntry>, Vec<Standing>) {
        if let Some(arena) = self.teardown() {
            let scores = arena.sim.read().scores();
            session.apply_scores(&scores);
        }
        session.finish(Utc::now());
        (session.score_entries(), standings(&session.players))
    }
}

struct Inner {
    config: EngineConfig,
    rooms: DashMap<RoomCode, Arc<Room>>,
    rng: Mutex<ChaCha8Rng>,
    limiter: InputRateLimiter,
    publisher: Arc<dyn FramePublisher>,
    sink: Arc<dyn ScoreSink>,
    stats: Arc<EngineStats>,
}

/// Creates, starts, ends and tears down rooms.
///
/// Cheap to clone. Operations that schedule work must run inside a Tokio
/// runtime.
#[derive(Clone)]
pub struct RoomManager {
    inner: Arc<Inner>,
}

impl RoomManager {
    pub fn new(
        config: EngineConfig,
        seed: u64,
        publisher: Arc<dyn FramePublisher>,
        sink: Arc<dyn ScoreSink>,
    ) -> Self {
        let limiter = InputRateLimiter::new(
            config.input_rate_limit,
            config.input_rate_window.as_millis() as u64,
        );
        Self {
            inner: Arc::new(Inner {
                config,
                rooms: DashMap::new(),
                rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
                limiter,
                publisher,
                sink,
                stats: Arc::new(EngineStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn room(&self, code: &RoomCode) -> Result<Arc<Room>, EngineError> {
        self.inner
            .rooms
            .get(code)
            .map(|r| r.value().clone())
            .ok_or_else(|| EngineError::RoomNotFound(code.clone()))
    }

    fn publish_state(&self, info: &RoomInfo) {
        self.inner
            .publisher
            .publish(&state_topic(&info.code), Frame::RoomState(info.clone()));
    }

    fn random_code(&self) -> RoomCode {
        let mut rng = self.inner.rng.lock();
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        RoomCode::new(code)
    }

    /// Open a new room in the lobby phase
    pub fn create_room(&self) -> Result<RoomCode, EngineError> {
        let config = &self.inner.config;
        for _ in 0..CODE_ATTEMPTS {
            let code = self.random_code();
            let room = match self.inner.rooms.entry(code.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let session = RoomSession::new(code.clone(), Utc::now(), config.join_window, config.round);
                    let room = Arc::new(Room {
                        session: Mutex::new(session),
                        tasks: Mutex::new(None),
                        arena: RwLock::new(None),
                    });
                    slot.insert(room.clone());
                    room
                }
            };

            let info = {
                let session = room.session.lock();
                self.arm_lobby(&room, &code, config.join_window);
                session.info(None)
            };
            EngineStats::bump(&self.inner.stats.rooms_created);
            info!(room = %code, "Room created");
            self.publish_state(&info);
            return Ok(code);
        }
        Err(EngineError::CodeExhausted)
    }

    /// Start the room on its own once the join window closes
    fn arm_lobby(&self, room: &Room, code: &RoomCode, delay: Duration) {
        let mut tasks = RoomTasks::new();
        tasks.spawn(auto_start(Arc::downgrade(&self.inner), code.clone(), delay));
        drop(room.tasks.lock().replace(tasks));
    }

    /// Seat a player; starts the room right away if its window already closed
    pub fn join(&self, code: &RoomCode, request: JoinRequest) -> Result<PlayerInfo, EngineError> {
        let room = self.room(code)?;
        let (player, info, overdue) = {
            let mut session = room.session.lock();
            let player = {
                let mut rng = self.inner.rng.lock();
                session.add_player(request.player_id, request.nickname, request.is_bot, &mut *rng)?
            };
            (player, session.info(None), session.is_overdue(Utc::now()))
        };

        info!(room = %code, actor = %player.id, color = ?player.color, "Player joined");
        if overdue {
            if let Err(err) = self.start(code) {
                debug!(room = %code, error = %err, "Overdue start skipped");
            }
        } else {
            self.publish_state(&info);
        }
        Ok(player)
    }

    /// Build the arena and schedule the tick, both broadcasts and the end
    /// of the round
    pub fn start(&self, code: &RoomCode) -> Result<RoomInfo, EngineError> {
        let room = self.room(code)?;
        let config = &self.inner.config;
        let mut session = room.session.lock();

        if session.phase != RoomPhase::Waiting {
            return Err(EngineError::InvalidPhase {
                room: code.clone(),
                expected: RoomPhase::Waiting,
                actual: session.phase,
            });
        }
        if session.players.is_empty() {
            return Err(EngineError::EmptyRoster(code.clone()));
        }

        let seed = {
            let mut rng = self.inner.rng.lock();
            if let Some(bot) = session.add_cpu_opponent(&mut *rng)? {
                info!(room = %code, actor = %bot.id, "Added CPU opponent");
            }
            rng.gen::<u64>()
        };

        let sim = Simulation::from_roster(&session.roster(), config.tick, seed)?;
        let arena_config = ArenaConfig::from(sim.surface());
        let arena = Arc::new(ArenaHandle::new(code.clone(), sim));

        // Lobby timer or anything left over from a previous round
        if room.teardown().is_some() {
            warn!(room = %code, "Discarded stale arena on start");
        }

        let mut tasks = RoomTasks::new();
        tasks.spawn(run_ticks(arena.clone(), config.tick, self.inner.stats.clone()));
        tasks.spawn(run_broadcast(
            arena.clone(),
            config.position_broadcast,
            FrameKind::Position,
            self.inner.publisher.clone(),
        ));
        tasks.spawn(run_broadcast(
            arena.clone(),
            config.paint_broadcast,
            FrameKind::Paint,
            self.inner.publisher.clone(),
        ));
        tasks.spawn(end_after(Arc::downgrade(&self.inner), code.clone(), config.round));

        *room.tasks.lock() = Some(tasks);
        *room.arena.write() = Some(arena);

        session.begin(arena_config, Utc::now());
        let info = session.info(None);
        drop(session);

        EngineStats::bump(&self.inner.stats.rooms_started);
        info!(room = %code, player_count = info.players.len(), "Round started");
        self.publish_state(&info);
        Ok(info)
    }

    /// Latch an input for the next tick, subject to the rate limit
    pub fn submit_input(
        &self,
        code: &RoomCode,
        actor: &ActorId,
        input: ArenaInput,
    ) -> Result<InputOutcome, EngineError> {
        let room = self.room(code)?;
        let arena = room.arena.read().clone();
        let Some(arena) = arena.filter(|a| a.is_live()) else {
            return Err(EngineError::InvalidPhase {
                room: code.clone(),
                expected: RoomPhase::Playing,
                actual: room.session.lock().phase,
            });
        };
        if !arena.inputs.contains(actor) {
            return Err(EngineError::UnknownActor {
                room: code.clone(),
                actor: actor.clone(),
            });
        }

        if !self.inner.limiter.allow(code, actor) {
            EngineStats::bump(&self.inner.stats.inputs_rate_limited);
            debug!(room = %code, actor = %actor, "Input rate limited");
            return Ok(InputOutcome::Dropped);
        }

        arena.inputs.submit(actor, input);
        EngineStats::bump(&self.inner.stats.inputs_applied);
        Ok(InputOutcome::Applied)
    }

    /// Finish the round: freeze scores, persist them and publish standings
    pub fn end_round(&self, code: &RoomCode) -> Result<Vec<Standing>, EngineError> {
        let room = self.room(code)?;
        let (entries, ranked) = {
            let mut session = room.session.lock();
            if session.phase != RoomPhase::Playing {
                return Err(EngineError::InvalidPhase {
                    room: code.clone(),
                    expected: RoomPhase::Playing,
                    actual: session.phase,
                });
            }
            room.close_round(&mut session)
        };
        self.settle_round(code, &entries, &ranked);
        Ok(ranked)
    }

    /// Persist the final scores of a closed round and publish its standings
    fn settle_round(&self, code: &RoomCode, entries: &[ScoreEntry], ranked: &[Standing]) {
        if let Err(err) = self.inner.sink.persist_scores(code, entries) {
            EngineStats::bump(&self.inner.stats.sink_failures);
            warn!(room = %code, error = %err, "Failed to persist scores");
        }
        self.inner.limiter.forget_room(code);

        EngineStats::bump(&self.inner.stats.rooms_ended);
        info!(
            room = %code,
            winner = ?ranked.first().map(|s| s.id.as_str()),
            "Round finished"
        );
        self.inner.publisher.publish(
            &end_topic(code),
            Frame::RoundEnd {
                code: code.clone(),
                standings: ranked.to_vec(),
            },
        );
    }

    /// Cancel everything scheduled for the room. A round in progress is
    /// finished with its live scores. Repeated calls are no-ops.
    pub fn stop(&self, code: &RoomCode) -> Result<(), EngineError> {
        let room = self.room(code)?;
        self.wind_down(code, &room);
        Ok(())
    }

    fn wind_down(&self, code: &RoomCode, room: &Room) {
        let mut session = room.session.lock();
        if session.phase == RoomPhase::Playing {
            let (entries, ranked) = room.close_round(&mut session);
            drop(session);
            info!(room = %code, "Round stopped early");
            self.settle_round(code, &entries, &ranked);
        } else if room.teardown().is_some() {
            debug!(room = %code, "Room stopped");
        }
    }

    /// Back to the lobby with scores and paint cleared and a new join window
    pub fn restart(&self, code: &RoomCode) -> Result<RoomInfo, EngineError> {
        let room = self.room(code)?;
        let join_window = self.inner.config.join_window;
        let info = {
            let mut session = room.session.lock();
            room.teardown();
            session.reset(Utc::now(), join_window);
            self.arm_lobby(&room, code, join_window);
            session.info(None)
        };
        self.inner.limiter.forget_room(code);
        info!(room = %code, "Room restarted");
        self.publish_state(&info);
        Ok(info)
    }

    /// Current room state; starts a lobby whose window has already closed
    pub fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, EngineError> {
        let room = self.room(code)?;
        let overdue = room.session.lock().is_overdue(Utc::now());
        if overdue {
            if let Err(err) = self.start(code) {
                debug!(room = %code, error = %err, "Overdue start skipped");
            }
        }

        let live = room.live_scores();
        let session = room.session.lock();
        Ok(session.info(live.as_deref()))
    }

    /// Stop the room and forget it
    pub fn remove_room(&self, code: &RoomCode) -> Result<(), EngineError> {
        let (_, room) = self
            .inner
            .rooms
            .remove(code)
            .ok_or_else(|| EngineError::RoomNotFound(code.clone()))?;
        self.wind_down(code, &room);
        self.inner.limiter.forget_room(code);
        info!(room = %code, "Room removed");
        Ok(())
    }

    /// Stop and drop every room
    pub fn shutdown(&self) {
        let codes = self.room_codes();
        for code in &codes {
            // a concurrent remove is fine here
            let _ = self.remove_room(code);
        }
        info!(rooms = codes.len(), "Room manager shut down");
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.inner.rooms.iter().map(|r| r.key().clone()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    /// Number of tasks currently scheduled for a room
    pub fn scheduled_tasks(&self, code: &RoomCode) -> Result<usize, EngineError> {
        let room = self.room(code)?;
        let count = room.tasks.lock().as_ref().map_or(0, RoomTasks::len);
        Ok(count)
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Drop input rate windows idle for `max_age`; returns how many remain
    pub fn prune_input_windows(&self, max_age: Duration) -> usize {
        self.prune_input_windows_at(unix_millis(), max_age)
    }

    fn prune_input_windows_at(&self, now_ms: u64, max_age: Duration) -> usize {
        self.inner.limiter.cleanup(now_ms, max_age.as_millis() as u64);
        self.inner.limiter.tracked_keys()
    }
}

async fn auto_start(manager: Weak<Inner>, code: RoomCode, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(inner) = manager.upgrade() else {
        return;
    };
    let manager = RoomManager { inner };
    match manager.start(&code) {
        Ok(_) => debug!(room = %code, "Join window closed, room started"),
        Err(err) => debug!(room = %code, error = %err, "Auto start skipped"),
    }
}

async fn end_after(manager: Weak<Inner>, code: RoomCode, round: Duration) {
    tokio::time::sleep(round).await;
    let Some(inner) = manager.upgrade() else {
        return;
    };
    let manager = RoomManager { inner };
    if let Err(err) = manager.end_round(&code) {
        debug!(room = %code, error = %err, "Round end skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::publisher::BroadcastPublisher;
    use crate::store::MemoryScoreSink;
    use tokio::time;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        manager: RoomManager,
        publisher: Arc<BroadcastPublisher>,
        sink: Arc<MemoryScoreSink>,
    }

    fn harness(config: EngineConfig) -> Harness {
        let publisher = Arc::new(BroadcastPublisher::new(4096));
        let sink = Arc::new(MemoryScoreSink::new());
        let manager = RoomManager::new(config, 11, publisher.clone(), sink.clone());
        Harness { manager, publisher, sink }
    }

    fn short_round() -> EngineConfig {
        EngineConfig {
            round: Duration::from_secs(1),
            ..EngineConfig::default()
        }
    }

    fn scores_of(info: &RoomInfo) -> Vec<(ActorId, u32)> {
        info.players.iter().map(|p| (p.id.clone(), p.score)).collect()
    }

    fn saved_scores(sink: &MemoryScoreSink, code: &RoomCode) -> Vec<(ActorId, u32)> {
        let saved = sink.get(code).expect("scores were saved");
        saved.scores.iter().map(|e| (e.actor_id.clone(), e.score)).collect()
    }

    fn open_room(manager: &RoomManager, players: &[&str]) -> RoomCode {
        let code = manager.create_room().unwrap();
        for id in players {
            manager.join(&code, JoinRequest::player(*id, id.to_uppercase())).unwrap();
        }
        code
    }

    #[tokio::test]
    async fn codes_are_six_alphanumerics() {
        let h = harness(EngineConfig::default());
        for _ in 0..20 {
            let code = h.manager.create_room().unwrap();
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
        assert_eq!(h.manager.room_count(), 20);
        assert_eq!(h.manager.stats().rooms_created, 20);
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn lobby_rules() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b", "c", "d"]);
        let info = h.manager.room_info(&code).unwrap();
        assert_eq!(info.phase, RoomPhase::Waiting);
        assert_eq!(info.players.len(), 4);
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 1);

        let err = h.manager.join(&code, JoinRequest::player("e", "E")).unwrap_err();
        assert!(matches!(err, EngineError::RoomFull(_)));
        let err = h
            .manager
            .join(&RoomCode::from("NOPE00"), JoinRequest::player("e", "E"))
            .unwrap_err();
        assert!(matches!(err, EngineError::RoomNotFound(_)));
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn empty_room_cannot_start() {
        let h = harness(EngineConfig::default());
        let code = h.manager.create_room().unwrap();
        let err = h.manager.start(&code).unwrap_err();
        assert!(matches!(err, EngineError::EmptyRoster(_)));
        assert_eq!(h.manager.room_info(&code).unwrap().phase, RoomPhase::Waiting);
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn solo_player_gets_cpu_opponent() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["solo"]);
        let info = assert_ok!(h.manager.start(&code));
        assert_eq!(info.phase, RoomPhase::Playing);
        assert_eq!(info.players.len(), 2);
        assert!(info.players[1].is_bot);
        assert_eq!(info.players[1].id.as_str(), format!("bot_{}", code));
        assert!(info.arena.is_some());
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 4);

        let err = h.manager.start(&code).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { actual: RoomPhase::Playing, .. }));
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));

        assert_ok!(h.manager.stop(&code));
        assert_ok!(h.manager.stop(&code));
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 0);

        let err = h
            .manager
            .submit_input(&code, &ActorId::from("a"), ArenaInput::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn stop_finishes_round_with_live_scores() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));
        time::sleep(Duration::from_millis(300)).await;

        // no await between reading and stopping, so no tick runs in between
        let live = scores_of(&h.manager.room_info(&code).unwrap());
        assert!(live.iter().any(|(_, score)| *score > 0));
        assert_ok!(h.manager.stop(&code));

        let info = h.manager.room_info(&code).unwrap();
        assert_eq!(info.phase, RoomPhase::Finished);
        assert_eq!(info.duration_ms, None);
        assert_eq!(scores_of(&info), live);
        assert_eq!(saved_scores(&h.sink, &code), live);
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 0);
        assert_eq!(h.manager.stats().rooms_ended, 1);

        let err = h.manager.end_round(&code).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { actual: RoomPhase::Finished, .. }));
        let err = h.manager.start(&code).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { actual: RoomPhase::Finished, .. }));
        let err = h
            .manager
            .submit_input(&code, &ActorId::from("a"), ArenaInput::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { actual: RoomPhase::Finished, .. }));

        assert_ok!(h.manager.stop(&code));
        assert_eq!(h.manager.stats().rooms_ended, 1);
        assert_ok!(h.manager.restart(&code));
        assert_ok!(h.manager.start(&code));
        h.manager.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_races_with_running_ticks() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));
        time::sleep(Duration::from_millis(50)).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = h.manager.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move { manager.stop(&code) }));
        }
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 0);

        // let an abort that raced a broadcast settle
        time::sleep(Duration::from_millis(20)).await;
        let sent = h.publisher.sent();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.publisher.sent(), sent);
    }

    #[tokio::test]
    async fn inputs_are_validated_and_rate_limited() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b"]);
        let err = h
            .manager
            .submit_input(&code, &ActorId::from("a"), ArenaInput::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { expected: RoomPhase::Playing, .. }));

        assert_ok!(h.manager.start(&code));
        assert_err!(h.manager.submit_input(&code, &ActorId::from("ghost"), ArenaInput::default()));

        let mut applied = 0;
        let mut dropped = 0;
        for _ in 0..25 {
            match h.manager.submit_input(&code, &ActorId::from("a"), ArenaInput::new(false, true, false)) {
                Ok(InputOutcome::Applied) => applied += 1,
                Ok(InputOutcome::Dropped) => dropped += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(applied, 20);
        assert_eq!(dropped, 5);
        let stats = h.manager.stats();
        assert_eq!(stats.inputs_applied, 20);
        assert_eq!(stats.inputs_rate_limited, 5);
        h.manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn round_ends_on_timer_and_persists_scores() {
        let h = harness(short_round());
        let mut rx = h.publisher.subscribe();
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));

        time::sleep(Duration::from_millis(1_100)).await;
        let info = h.manager.room_info(&code).unwrap();
        assert_eq!(info.phase, RoomPhase::Finished);
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 0);

        // both actors landed and painted, so the frozen scores are not zeros
        let saved = saved_scores(&h.sink, &code);
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|(_, score)| *score > 0));
        assert_eq!(scores_of(&info), saved);
        assert_eq!(h.manager.stats().rooms_ended, 1);

        let end_topic = end_topic(&code);
        let mut saw_end = false;
        while let Ok(published) = rx.try_recv() {
            if published.topic == end_topic {
                if let Frame::RoundEnd { standings, .. } = published.frame {
                    assert_eq!(standings.len(), 2);
                    assert!(standings[0].score >= standings[1].score);
                    for standing in &standings {
                        assert!(saved.contains(&(standing.id.clone(), standing.score)));
                    }
                    saw_end = true;
                }
            }
        }
        assert!(saw_end);
    }

    #[tokio::test]
    async fn end_round_saves_live_scores() {
        let h = harness(EngineConfig::default());
        let mut rx = h.publisher.subscribe();
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));
        time::sleep(Duration::from_millis(300)).await;

        let live = scores_of(&h.manager.room_info(&code).unwrap());
        assert!(live.iter().any(|(_, score)| *score > 0));
        let standings = assert_ok!(h.manager.end_round(&code));

        assert_eq!(saved_scores(&h.sink, &code), live);
        assert_eq!(scores_of(&h.manager.room_info(&code).unwrap()), live);
        for standing in &standings {
            assert!(live.contains(&(standing.id.clone(), standing.score)));
        }

        let end_topic = end_topic(&code);
        let published = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|p| p.topic == end_topic)
            .expect("round end was published");
        match published.frame {
            Frame::RoundEnd { standings: sent, .. } => assert_eq!(sent, standings),
            other => panic!("unexpected frame: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn finished_and_idle_rooms_release_input_windows() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));
        for id in ["a", "b"] {
            assert_ok!(h.manager.submit_input(&code, &ActorId::from(id), ArenaInput::default()));
        }
        let max_age = Duration::from_secs(60);
        assert_eq!(h.manager.prune_input_windows(max_age), 2);
        assert_eq!(h.manager.prune_input_windows_at(unix_millis() + 61_000, max_age), 0);

        assert_ok!(h.manager.submit_input(&code, &ActorId::from("a"), ArenaInput::default()));
        assert_eq!(h.manager.prune_input_windows(max_age), 1);
        assert_ok!(h.manager.end_round(&code));
        assert_eq!(h.manager.prune_input_windows(max_age), 0);
    }

    #[tokio::test]
    async fn sink_failure_does_not_block_finish() {
        let h = harness(EngineConfig::default());
        h.sink.set_offline(true);
        let code = open_room(&h.manager, &["a", "b"]);
        assert_ok!(h.manager.start(&code));

        let standings = assert_ok!(h.manager.end_round(&code));
        assert_eq!(standings.len(), 2);
        assert_eq!(h.manager.room_info(&code).unwrap().phase, RoomPhase::Finished);
        assert_eq!(h.manager.stats().sink_failures, 1);
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 0);

        let err = h.manager.end_round(&code).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn join_window_starts_room() {
        let config = EngineConfig {
            join_window: Duration::from_secs(2),
            ..EngineConfig::default()
        };
        let h = harness(config);
        let code = open_room(&h.manager, &["a"]);
        time::sleep(Duration::from_millis(2_100)).await;

        let info = h.manager.room_info(&code).unwrap();
        assert_eq!(info.phase, RoomPhase::Playing);
        assert_eq!(info.players.len(), 2);
        assert_eq!(h.manager.stats().rooms_started, 1);
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn restart_returns_to_lobby() {
        let h = harness(EngineConfig::default());
        let code = open_room(&h.manager, &["a"]);
        assert_ok!(h.manager.start(&code));
        assert_ok!(h.manager.end_round(&code));

        let info = assert_ok!(h.manager.restart(&code));
        assert_eq!(info.phase, RoomPhase::Waiting);
        assert!(info.players.iter().all(|p| p.score == 0));
        assert!(info.arena.is_none());
        assert_eq!(h.manager.scheduled_tasks(&code).unwrap(), 1);

        // the roster already holds the CPU opponent
        let info = assert_ok!(h.manager.start(&code));
        assert_eq!(info.players.len(), 2);
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn remove_and_shutdown() {
        let h = harness(EngineConfig::default());
        let first = open_room(&h.manager, &["a", "b"]);
        let second = open_room(&h.manager, &["c"]);
        assert_ok!(h.manager.start(&first));

        assert_ok!(h.manager.remove_room(&first));
        assert!(matches!(h.manager.room_info(&first), Err(EngineError::RoomNotFound(_))));
        // the round in progress was closed out on the way
        assert_eq!(h.sink.get(&first).map(|saved| saved.scores.len()), Some(2));
        assert!(h.sink.get(&second).is_none());
        assert_err!(h.manager.remove_room(&first));

        h.manager.shutdown();
        assert_eq!(h.manager.room_count(), 0);
        assert!(h.manager.scheduled_tasks(&second).is_err());
    }
}
