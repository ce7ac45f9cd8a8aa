//! Snapshot building for broadcast frames

use std::collections::BTreeMap;

use crate::protocol::{ActorPosition, Frame};

use super::simulation::Simulation;
use super::RoomCode;

/// Builds read-only frames from a room's simulation
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    code: RoomCode,
}

impl SnapshotBuilder {
    pub fn new(code: RoomCode) -> Self {
        Self { code }
    }

    /// Positions, grounded flags and live scores
    pub fn position_frame(&self, sim: &Simulation) -> Frame {
        let players = sim
            .actors()
            .iter()
            .map(|a| ActorPosition {
                id: a.id.clone(),
                x: a.x,
                y: a.y,
                grounded: a.grounded,
            })
            .collect();
        let scores: BTreeMap<_, _> = sim.scores().into_iter().collect();

        Frame::Position {
            code: self.code.clone(),
            tick: sim.tick_count(),
            players,
            scores,
        }
    }

    /// The full paint grid
    pub fn paint_frame(&self, sim: &Simulation) -> Frame {
        Frame::Paint {
            code: self.code.clone(),
            tick: sim.tick_count(),
            platforms: sim.ledger().grid().to_vec(),
        }
    }
}

/// Frame size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_frames: u64,
    pub total_bytes: u64,
    pub avg_players_per_frame: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_frames += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_frames as f32;
        self.avg_players_per_frame =
            self.avg_players_per_frame * ((n - 1.0) / n) + (player_count as f32 / n);
    }

    pub fn avg_bytes(&self) -> u64 {
        if self.total_frames == 0 {
            0
        } else {
            self.total_bytes / self.total_frames
        }
    }
}
