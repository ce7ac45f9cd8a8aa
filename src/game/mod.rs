//! Arena simulation modules

pub mod actor;
pub mod arena;
pub mod bot;
pub mod input;
pub mod ledger;
pub mod physics;
pub mod simulation;
pub mod snapshot;

pub use actor::{ActorSpec, ActorState, CellId};
pub use arena::{Platform, SurfaceModel};
pub use input::{ArenaInput, InputBuffer};
pub use ledger::PaintLedger;
pub use simulation::{Simulation, TickReport};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable per-player identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Short alphanumeric code identifying a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// Paint colors a player can be assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaintColor {
    Yellow,
    Pink,
    Purple,
    Green,
}

impl PaintColor {
    pub const ALL: [PaintColor; 4] = [
        PaintColor::Yellow,
        PaintColor::Pink,
        PaintColor::Purple,
        PaintColor::Green,
    ];
}
