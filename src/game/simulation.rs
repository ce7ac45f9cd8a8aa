//! Per-room physics and painting step

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;
use crate::util::time::tick_delta;

use super::actor::{ActorSpec, ActorState, CellId, ACTOR_WIDTH};
use super::arena::{self, SurfaceModel};
use super::bot::BotController;
use super::input::{ArenaInput, InputBuffer};
use super::ledger::PaintLedger;
use super::physics::{GroundContact, MovementStats, PhysicsSystem};
use super::ActorId;

/// Minimum time between two score credits for the same actor
pub const SCORE_COOLDOWN_MS: u64 = 150;

/// A credit moved away from a previous owner during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debit {
    pub painter: ActorId,
    pub victim: ActorId,
    pub cell: CellId,
}

/// What a single tick changed in the scoring ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub credits: Vec<(ActorId, CellId)>,
    pub debits: Vec<Debit>,
    pub cells_repainted: usize,
}

/// Scoring caps that span all actors within one tick
#[derive(Debug, Default)]
struct TickCaps {
    debited_cells: HashSet<CellId>,
}

/// Authoritative arena simulation for one room.
///
/// The tick is the only writer of actor state, paint, and credits.
/// Actors are processed in roster order so contested cells resolve the
/// same way for the same prior state.
pub struct Simulation {
    surface: SurfaceModel,
    actors: Vec<ActorState>,
    ledger: PaintLedger,
    inputs: Arc<InputBuffer>,
    bots: BotController,
    stats: MovementStats,
    dt: f64,
    tick: u64,
}

impl Simulation {
    pub fn new(
        surface: SurfaceModel,
        actors: Vec<ActorState>,
        tick: Duration,
        seed: u64,
    ) -> Self {
        let inputs = Arc::new(InputBuffer::new(actors.iter().map(|a| a.id.clone())));
        let ledger = PaintLedger::new(&surface);
        Self {
            surface,
            actors,
            ledger,
            inputs,
            bots: BotController::new(seed),
            stats: MovementStats::default(),
            dt: tick_delta(tick),
            tick: 0,
        }
    }

    /// Standard arena populated from a roster
    pub fn from_roster(players: &[ActorSpec], tick: Duration, seed: u64) -> Result<Self, EngineError> {
        let (surface, actors) = arena::build(players)?;
        Ok(Self::new(surface, actors, tick, seed))
    }

    pub fn surface(&self) -> &SurfaceModel {
        &self.surface
    }

    pub fn actors(&self) -> &[ActorState] {
        &self.actors
    }

    pub fn actor(&self, id: &ActorId) -> Option<&ActorState> {
        self.actors.iter().find(|a| &a.id == id)
    }

    pub fn ledger(&self) -> &PaintLedger {
        &self.ledger
    }

    /// Input latches, shared with network handlers
    pub fn inputs(&self) -> &Arc<InputBuffer> {
        &self.inputs
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn scores(&self) -> Vec<(ActorId, u32)> {
        self.actors.iter().map(|a| (a.id.clone(), a.score)).collect()
    }

    /// Advance the room by one fixed tick
    pub fn step(&mut self, now_ms: u64) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        // Bots decide before anyone moves, through the same latches players use
        for actor in self.actors.iter().filter(|a| a.is_bot) {
            let input = self.bots.decide(actor, &self.surface, &self.stats, now_ms);
            self.inputs.submit(&actor.id, input);
        }

        let mut caps = TickCaps::default();
        for idx in 0..self.actors.len() {
            let input = self.inputs.take(&self.actors[idx].id);
            let contact = self.integrate(idx, input);
            if let Some(platform) = contact.platform {
                self.paint_footprint(idx, platform, now_ms, &mut caps, &mut report);
            }
        }

        report
    }

    fn integrate(&mut self, idx: usize, input: ArenaInput) -> GroundContact {
        let stats = &self.stats;
        let surface = &self.surface;
        let dt = self.dt;
        let actor = &mut self.actors[idx];

        let vx = PhysicsSystem::integrate_horizontal(actor.vx, input.direction(), dt, stats);
        let vy = PhysicsSystem::integrate_vertical(actor.vy, input.jump, actor.grounded, dt, stats);

        let (x, vx) = PhysicsSystem::move_horizontal(actor.x, actor.y, vx, dt, surface);
        actor.x = x;
        actor.vx = vx;

        let vertical = PhysicsSystem::move_vertical(actor.x, actor.y, vy, dt, surface);
        actor.y = vertical.y;
        actor.vy = vertical.vy;

        let contact = PhysicsSystem::ground_contact(actor.x, actor.y, vertical.landed_on, surface, stats);
        actor.grounded = contact.grounded;
        contact
    }

    /// Repaint every cell under the actor's footprint and settle credits.
    ///
    /// Per painter and tick: at most one credit (also gated by the score
    /// cooldown) and at most one debit. Per cell and tick: at most one
    /// debit across all painters. Only a horizontally moving painter can
    /// debit, and the debit always lands on whoever holds the cell's credit,
    /// even after someone else has painted over it while standing still.
    fn paint_footprint(
        &mut self,
        idx: usize,
        platform_idx: usize,
        now_ms: u64,
        caps: &mut TickCaps,
        report: &mut TickReport,
    ) {
        let platform = self.surface.platforms[platform_idx];
        let painter = &self.actors[idx];
        let painter_id = painter.id.clone();
        let color = painter.color;
        let range = platform.cell_range(painter.x, painter.x + ACTOR_WIDTH);
        let can_score = now_ms.saturating_sub(painter.last_score_ms) >= SCORE_COOLDOWN_MS;
        let moving = PhysicsSystem::is_moving(painter.vx, &self.stats);

        let mut scored = false;
        let mut debited = false;

        for cell_idx in range {
            let cell = CellId::new(platform_idx, cell_idx);
            let previous = self.ledger.color_at(cell);
            if previous == Some(color) {
                continue;
            }

            if moving && !debited && !caps.debited_cells.contains(&cell) {
                let holder = self.ledger.holder(cell).filter(|h| **h != painter_id).cloned();
                if let Some(victim_id) = holder {
                    if self.ledger.revoke(&victim_id, cell) {
                        if let Some(victim) = self.actors.iter_mut().find(|a| a.id == victim_id) {
                            victim.score = victim.score.saturating_sub(1);
                        }
                        caps.debited_cells.insert(cell);
                        debited = true;
                        report.debits.push(Debit {
                            painter: painter_id.clone(),
                            victim: victim_id,
                            cell,
                        });
                    }
                }
            }

            self.ledger.paint(cell, color);
            report.cells_repainted += 1;

            if can_score && !scored && self.ledger.grant(&painter_id, cell) {
                let painter = &mut self.actors[idx];
                painter.score += 1;
                painter.last_score_ms = now_ms;
                scored = true;
                report.credits.push((painter_id.clone(), cell));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn actor_mut(&mut self, id: &ActorId) -> Option<&mut ActorState> {
        self.actors.iter_mut().find(|a| &a.id == id)
    }
}
