//! Per-player physical and scoring state

use serde::{Deserialize, Serialize};

use super::{ActorId, PaintColor};

/// Actor bounding box width
pub const ACTOR_WIDTH: f64 = 24.0;
/// Actor bounding box height
pub const ACTOR_HEIGHT: f64 = 32.0;

/// A player or bot admitted to a room, as handed over by the lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSpec {
    pub id: ActorId,
    pub color: PaintColor,
    pub is_bot: bool,
}

impl ActorSpec {
    pub fn player(id: impl Into<ActorId>, color: PaintColor) -> Self {
        Self {
            id: id.into(),
            color,
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<ActorId>, color: PaintColor) -> Self {
        Self {
            id: id.into(),
            color,
            is_bot: true,
        }
    }
}

/// Identifier of one paint cell: platform index plus column index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub platform: usize,
    pub cell: usize,
}

impl CellId {
    pub fn new(platform: usize, cell: usize) -> Self {
        Self { platform, cell }
    }
}

/// Actor state in a room (authoritative)
#[derive(Debug, Clone)]
pub struct ActorState {
    pub id: ActorId,
    pub color: PaintColor,
    pub is_bot: bool,

    // Position (top-left corner) and movement
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub grounded: bool,

    // Scoring
    pub score: u32,
    pub last_score_ms: u64,
}

impl ActorState {
    pub fn new(spec: &ActorSpec, spawn_x: f64, spawn_y: f64) -> Self {
        Self {
            id: spec.id.clone(),
            color: spec.color,
            is_bot: spec.is_bot,
            x: spawn_x,
            y: spawn_y,
            vx: 0.0,
            vy: 0.0,
            grounded: false,
            score: 0,
            last_score_ms: 0,
        }
    }
}
