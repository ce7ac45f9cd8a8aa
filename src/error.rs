//! Engine error types

use crate::game::{ActorId, RoomCode};
use crate::room::RoomPhase;

/// Errors reported to callers of the room engine.
///
/// None of these are fatal: they describe a rejected request and leave
/// all room state untouched.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    #[error("Unknown actor {actor} in room {room}")]
    UnknownActor { room: RoomCode, actor: ActorId },

    #[error("Room {0} is full")]
    RoomFull(RoomCode),

    #[error("Player {actor} already joined room {room}")]
    AlreadyJoined { room: RoomCode, actor: ActorId },

    #[error("Room {room} is {actual:?}, expected {expected:?}")]
    InvalidPhase {
        room: RoomCode,
        expected: RoomPhase,
        actual: RoomPhase,
    },

    #[error("Room {0} has no players")]
    EmptyRoster(RoomCode),

    #[error("Malformed roster: {0}")]
    MalformedRoster(String),

    #[error("Unable to generate a unique room code")]
    CodeExhausted,
}

/// Score persistence failures (best effort, never block room teardown)
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Score store unavailable: {0}")]
    Unavailable(String),

    #[error("Score store rejected write: {0}")]
    Rejected(String),
}
