//! Paint grid and scoring credits

use std::collections::{HashMap, HashSet};

use super::actor::CellId;
use super::arena::SurfaceModel;
use super::{ActorId, PaintColor};

/// Canonical color per cell plus who is credited for each cell.
///
/// Every cell has at most one color and at most one credit holder. A
/// credit is only ever granted for a painted cell and cells are never
/// unpainted while a round runs, so the number of credits never exceeds
/// the number of painted cells.
#[derive(Debug, Clone, Default)]
pub struct PaintLedger {
    paint: Vec<Vec<Option<PaintColor>>>,
    holders: HashMap<CellId, ActorId>,
    credits: HashMap<ActorId, HashSet<CellId>>,
}

impl PaintLedger {
    pub fn new(surface: &SurfaceModel) -> Self {
        Self {
            paint: surface
                .platforms
                .iter()
                .map(|p| vec![None; p.cell_count()])
                .collect(),
            holders: HashMap::new(),
            credits: HashMap::new(),
        }
    }

    pub fn color_at(&self, cell: CellId) -> Option<PaintColor> {
        self.paint
            .get(cell.platform)
            .and_then(|row| row.get(cell.cell))
            .copied()
            .flatten()
    }

    /// Set the color of `cell`, returning the previous color.
    /// Out-of-range cells are ignored.
    pub fn paint(&mut self, cell: CellId, color: PaintColor) -> Option<PaintColor> {
        self.paint
            .get_mut(cell.platform)
            .and_then(|row| row.get_mut(cell.cell))
            .and_then(|slot| slot.replace(color))
    }

    pub fn holder(&self, cell: CellId) -> Option<&ActorId> {
        self.holders.get(&cell)
    }

    pub fn has_credit(&self, actor: &ActorId, cell: CellId) -> bool {
        self.holders.get(&cell) == Some(actor)
    }

    /// Credit `cell` to `actor`. Fails if the cell is unpainted or any
    /// actor (including `actor`) already holds it.
    pub fn grant(&mut self, actor: &ActorId, cell: CellId) -> bool {
        if self.color_at(cell).is_none() || self.holders.contains_key(&cell) {
            return false;
        }
        self.holders.insert(cell, actor.clone());
        self.credits.entry(actor.clone()).or_default().insert(cell);
        true
    }

    /// Remove `actor`'s credit for `cell`; false if they did not hold it
    pub fn revoke(&mut self, actor: &ActorId, cell: CellId) -> bool {
        if !self.has_credit(actor, cell) {
            return false;
        }
        self.holders.remove(&cell);
        if let Some(set) = self.credits.get_mut(actor) {
            set.remove(&cell);
        }
        true
    }

    pub fn credits_of(&self, actor: &ActorId) -> usize {
        self.credits.get(actor).map(HashSet::len).unwrap_or(0)
    }

    pub fn credited_cells(&self, actor: &ActorId) -> impl Iterator<Item = &CellId> {
        self.credits.get(actor).into_iter().flatten()
    }

    pub fn total_credits(&self) -> usize {
        self.holders.len()
    }

    pub fn painted_cells(&self) -> usize {
        self.paint
            .iter()
            .flatten()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Per-platform cell colors, indexed like the surface's platforms
    pub fn grid(&self) -> &[Vec<Option<PaintColor>>] {
        &self.paint
    }
}
