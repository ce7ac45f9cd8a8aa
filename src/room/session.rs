//! Room membership and round metadata

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::EngineError;
use crate::game::{ActorId, ActorSpec, PaintColor, RoomCode};
use crate::protocol::{ArenaConfig, PlayerInfo, RoomInfo, ScoreEntry};
use crate::util::time::to_millis;

use super::RoomPhase;

/// Players per room, one per paint color
pub const MAX_PLAYERS: usize = PaintColor::ALL.len();

/// Nickname given to the opponent added for a lone player
pub const CPU_NICKNAME: &str = "CPU";

/// Everything about a room that outlives a single round
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub code: RoomCode,
    pub phase: RoomPhase,
    /// Join order
    pub players: Vec<PlayerInfo>,
    pub created_at: DateTime<Utc>,
    pub join_deadline: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub round: Duration,
    pub arena: Option<ArenaConfig>,
}

fn after(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    at + chrono::Duration::milliseconds(delay.as_millis() as i64)
}

impl RoomSession {
    pub fn new(code: RoomCode, now: DateTime<Utc>, join_window: Duration, round: Duration) -> Self {
        Self {
            code,
            phase: RoomPhase::Waiting,
            players: Vec::new(),
            created_at: now,
            join_deadline: after(now, join_window),
            started_at: None,
            finished_at: None,
            round,
            arena: None,
        }
    }

    /// Still waiting although the join window has elapsed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.phase == RoomPhase::Waiting && now >= self.join_deadline
    }

    pub fn free_colors(&self) -> Vec<PaintColor> {
        PaintColor::ALL
            .into_iter()
            .filter(|c| self.players.iter().all(|p| p.color != *c))
            .collect()
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.players.iter().any(|p| &p.id == id)
    }

    /// Seat a player with a random unused color
    pub fn add_player<R: Rng>(
        &mut self,
        id: ActorId,
        nickname: String,
        is_bot: bool,
        rng: &mut R,
    ) -> Result<PlayerInfo, EngineError> {
        if self.phase != RoomPhase::Waiting {
            return Err(EngineError::InvalidPhase {
                room: self.code.clone(),
                expected: RoomPhase::Waiting,
                actual: self.phase,
            });
        }
        if self.contains(&id) {
            return Err(EngineError::AlreadyJoined {
                room: self.code.clone(),
                actor: id,
            });
        }
        let color = *self
            .free_colors()
            .choose(rng)
            .ok_or_else(|| EngineError::RoomFull(self.code.clone()))?;

        let player = PlayerInfo {
            id,
            nickname,
            color,
            is_bot,
            score: 0,
        };
        self.players.push(player.clone());
        Ok(player)
    }

    /// Add the CPU opponent when exactly one player is seated
    pub fn add_cpu_opponent<R: Rng>(&mut self, rng: &mut R) -> Result<Option<PlayerInfo>, EngineError> {
        if self.players.len() != 1 {
            return Ok(None);
        }
        let id = ActorId::new(format!("bot_{}", self.code));
        self.add_player(id, CPU_NICKNAME.to_string(), true, rng).map(Some)
    }

    pub fn roster(&self) -> Vec<ActorSpec> {
        self.players
            .iter()
            .map(|p| ActorSpec {
                id: p.id.clone(),
                color: p.color,
                is_bot: p.is_bot,
            })
            .collect()
    }

    pub fn begin(&mut self, arena: ArenaConfig, now: DateTime<Utc>) {
        self.phase = RoomPhase::Playing;
        self.started_at = Some(now);
        self.finished_at = None;
        self.arena = Some(arena);
    }

    /// Copy live scores onto the seated players
    pub fn apply_scores(&mut self, scores: &[(ActorId, u32)]) {
        for (id, score) in scores {
            if let Some(player) = self.players.iter_mut().find(|p| &p.id == id) {
                player.score = *score;
            }
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.phase = RoomPhase::Finished;
        self.finished_at = Some(now);
    }

    /// Back to the lobby with a fresh join window, keeping the roster
    pub fn reset(&mut self, now: DateTime<Utc>, join_window: Duration) {
        self.phase = RoomPhase::Waiting;
        self.join_deadline = after(now, join_window);
        self.started_at = None;
        self.finished_at = None;
        self.arena = None;
        for player in &mut self.players {
            player.score = 0;
        }
    }

    pub fn score_entries(&self) -> Vec<ScoreEntry> {
        self.players
            .iter()
            .map(|p| ScoreEntry {
                actor_id: p.id.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Snapshot for clients; `live` overrides stored scores during a round
    pub fn info(&self, live: Option<&[(ActorId, u32)]>) -> RoomInfo {
        let players = self
            .players
            .iter()
            .map(|p| {
                let mut p = p.clone();
                if let Some((_, score)) = live.and_then(|s| s.iter().find(|(id, _)| id == &p.id)) {
                    p.score = *score;
                }
                p
            })
            .collect();

        RoomInfo {
            code: self.code.clone(),
            phase: self.phase,
            join_deadline_ms: (self.phase == RoomPhase::Waiting).then(|| to_millis(self.join_deadline)),
            started_at_ms: self.started_at.map(to_millis),
            duration_ms: (self.phase == RoomPhase::Playing).then(|| self.round.as_millis() as u64),
            players,
            arena: self.arena.clone(),
        }
    }
}
