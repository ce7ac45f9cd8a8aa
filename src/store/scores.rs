//! Final score persistence

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::SinkError;
use crate::game::RoomCode;
use crate::protocol::ScoreEntry;

/// Destination for the scores of a finished round.
///
/// Called once per round end. Failures are reported but never block the
/// room from finishing.
pub trait ScoreSink: Send + Sync {
    fn persist_scores(&self, room: &RoomCode, scores: &[ScoreEntry]) -> Result<(), SinkError>;
}

/// Persisted result of one round
#[derive(Debug, Clone)]
pub struct SavedRound {
    pub scores: Vec<ScoreEntry>,
    pub saved_at: DateTime<Utc>,
}

/// In-process sink keeping the latest round per room
#[derive(Debug, Default)]
pub struct MemoryScoreSink {
    rounds: DashMap<RoomCode, SavedRound>,
    offline: AtomicBool,
}

impl MemoryScoreSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest persisted scores for a room
    pub fn get(&self, room: &RoomCode) -> Option<SavedRound> {
        self.rounds.get(room).map(|r| r.value().clone())
    }

    pub fn rooms(&self) -> usize {
        self.rounds.len()
    }

    /// Make every write fail with `SinkError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }
}

impl ScoreSink for MemoryScoreSink {
    fn persist_scores(&self, room: &RoomCode, scores: &[ScoreEntry]) -> Result<(), SinkError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(SinkError::Unavailable(format!("memory sink offline for {}", room)));
        }
        self.rounds.insert(
            room.clone(),
            SavedRound {
                scores: scores.to_vec(),
                saved_at: Utc::now(),
            },
        );
        Ok(())
    }
}
