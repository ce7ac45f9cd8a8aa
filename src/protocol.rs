//! Outbound frame definitions
//! These are the structured values handed to the frame publisher

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::{ActorId, PaintColor, Platform, RoomCode, SurfaceModel};
use crate::room::RoomPhase;

pub fn arena_topic(code: &RoomCode) -> String {
    format!("/topic/board/{}/arena", code)
}

pub fn state_topic(code: &RoomCode) -> String {
    format!("/topic/board/{}/state", code)
}

pub fn end_topic(code: &RoomCode) -> String {
    format!("/topic/board/{}/end", code)
}

/// Frames published to room subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// High-frequency actor positions and live scores
    Position {
        code: RoomCode,
        tick: u64,
        players: Vec<ActorPosition>,
        scores: BTreeMap<ActorId, u32>,
    },

    /// Full paint state, one color slot per cell
    Paint {
        code: RoomCode,
        tick: u64,
        platforms: Vec<Vec<Option<PaintColor>>>,
    },

    /// Lobby or round state change
    RoomState(RoomInfo),

    /// Final standings after a round
    RoundEnd {
        code: RoomCode,
        standings: Vec<Standing>,
    },
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Position { .. } => "position",
            Frame::Paint { .. } => "paint",
            Frame::RoomState(_) => "room_state",
            Frame::RoundEnd { .. } => "round_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorPosition {
    pub id: ActorId,
    pub x: f64,
    pub y: f64,
    pub grounded: bool,
}

/// Player as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ActorId,
    pub nickname: String,
    pub color: PaintColor,
    pub is_bot: bool,
    pub score: u32,
}

/// Surface geometry clients need to draw the arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
    pub platforms: Vec<PlatformInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub cells: usize,
}

impl From<&Platform> for PlatformInfo {
    fn from(p: &Platform) -> Self {
        Self {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
            cells: p.cells,
        }
    }
}

impl From<&SurfaceModel> for ArenaConfig {
    fn from(surface: &SurfaceModel) -> Self {
        Self {
            width: surface.width,
            height: surface.height,
            platforms: surface.platforms.iter().map(PlatformInfo::from).collect(),
        }
    }
}

/// Room snapshot for lobby screens and state frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: RoomPhase,
    pub join_deadline_ms: Option<u64>,
    pub started_at_ms: Option<u64>,
    /// Round length, only while playing
    pub duration_ms: Option<u64>,
    pub players: Vec<PlayerInfo>,
    pub arena: Option<ArenaConfig>,
}

/// One persisted score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub actor_id: ActorId,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: u32,
    pub id: ActorId,
    pub nickname: String,
    pub color: PaintColor,
    pub is_bot: bool,
    pub score: u32,
}

/// Rank players by score, highest first; ties keep join order
pub fn standings(players: &[PlayerInfo]) -> Vec<Standing> {
    let mut ranked: Vec<&PlayerInfo> = players.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| Standing {
            rank: i as u32 + 1,
            id: p.id.clone(),
            nickname: p.nickname.clone(),
            color: p.color,
            is_bot: p.is_bot,
            score: p.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, color: PaintColor, score: u32) -> PlayerInfo {
        PlayerInfo {
            id: ActorId::from(id),
            nickname: id.to_uppercase(),
            color,
            is_bot: false,
            score,
        }
    }

    #[test]
    fn standings_sort_descending_and_keep_ties_stable() {
        let players = vec![
            player("a", PaintColor::Yellow, 3),
            player("b", PaintColor::Pink, 7),
            player("c", PaintColor::Green, 3),
        ];
        let ranked = standings(&players);
        let order: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn frames_are_tagged() {
        let frame = Frame::RoundEnd {
            code: RoomCode::from("ABC123"),
            standings: vec![],
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "round_end");
        assert_eq!(json["code"], "ABC123");
    }

    #[test]
    fn topics_follow_board_layout() {
        let code = RoomCode::from("XYZ789");
        assert_eq!(arena_topic(&code), "/topic/board/XYZ789/arena");
        assert_eq!(state_topic(&code), "/topic/board/XYZ789/state");
        assert_eq!(end_topic(&code), "/topic/board/XYZ789/end");
    }
}
