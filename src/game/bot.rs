//! Synthetic input for unattended actors

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::actor::{ActorState, ACTOR_WIDTH};
use super::arena::SurfaceModel;
use super::input::ArenaInput;
use super::physics::{MovementStats, PhysicsSystem};
use super::ActorId;

/// Minimum time between bot decisions
pub const DECISION_MIN_MS: u64 = 700;
/// Random extra delay added to each decision interval
pub const DECISION_JITTER_MS: u64 = 500;
/// Chance to reverse direction at a decision point
pub const FLIP_CHANCE: f64 = 0.20;
/// Chance to hop at a decision point when grounded
pub const JUMP_CHANCE: f64 = 0.30;
/// Distance from a platform edge at which a bot turns around
pub const EDGE_MARGIN: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
struct BotBrain {
    direction: i8,
    next_decision_ms: u64,
}

/// Wandering bot AI: walk, turn at platform edges, and at jittered
/// intervals maybe flip direction or hop
pub struct BotController {
    rng: ChaCha8Rng,
    brains: HashMap<ActorId, BotBrain>,
}

impl BotController {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            brains: HashMap::new(),
        }
    }

    /// Produce this tick's input for `actor`
    pub fn decide(
        &mut self,
        actor: &ActorState,
        surface: &SurfaceModel,
        stats: &MovementStats,
        now_ms: u64,
    ) -> ArenaInput {
        let rng = &mut self.rng;
        let brain = self.brains.entry(actor.id.clone()).or_insert_with(|| BotBrain {
            direction: if rng.gen_bool(0.5) { -1 } else { 1 },
            next_decision_ms: 0,
        });

        if let Some(idx) = PhysicsSystem::platform_underfoot(actor.x, actor.y, surface, stats) {
            let platform = &surface.platforms[idx];
            let left_edge = platform.x;
            let right_edge = platform.right() - ACTOR_WIDTH;
            if actor.x <= left_edge + EDGE_MARGIN {
                brain.direction = 1;
            } else if actor.x >= right_edge - EDGE_MARGIN {
                brain.direction = -1;
            }
        }

        let mut jump = false;
        if now_ms >= brain.next_decision_ms {
            brain.next_decision_ms = now_ms + DECISION_MIN_MS + rng.gen_range(0..DECISION_JITTER_MS);
            let roll: f64 = rng.gen();
            if roll < FLIP_CHANCE {
                brain.direction = -brain.direction;
            }
            if actor.grounded && roll > 1.0 - JUMP_CHANCE {
                jump = true;
            }
        }

        ArenaInput::new(brain.direction < 0, brain.direction > 0, jump)
    }

    /// Current walking direction of a bot, if it has decided anything yet
    pub fn direction(&self, actor: &ActorId) -> Option<i8> {
        self.brains.get(actor).map(|b| b.direction)
    }

    pub fn next_decision_ms(&self, actor: &ActorId) -> Option<u64> {
        self.brains.get(actor).map(|b| b.next_decision_ms)
    }
}
