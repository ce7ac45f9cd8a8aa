//! Room lifecycle: lobby, round scheduling and teardown

pub mod manager;
pub mod publisher;
pub mod session;
mod tasks;

pub use manager::{EngineStats, EngineStatsSnapshot, InputOutcome, JoinRequest, RoomManager};
pub use publisher::{BroadcastPublisher, FramePublisher, Published};
pub use session::{RoomSession, MAX_PLAYERS};

use serde::{Deserialize, Serialize};

/// Room phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    /// Accepting joins, nothing simulated
    Waiting,
    /// Round in progress
    Playing,
    /// Round over, scores final
    Finished,
}
