//! Static arena geometry and the fixed room template

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::EngineError;

use super::actor::{ActorSpec, ActorState, ACTOR_HEIGHT, ACTOR_WIDTH};

/// Arena width for the standard template
pub const ARENA_WIDTH: f64 = 980.0;
/// Arena height for the standard template
pub const ARENA_HEIGHT: f64 = 540.0;

/// Axis-aligned platform split into equal-width paint cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Platform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub cells: usize,
}

impl Platform {
    pub fn new(x: f64, y: f64, width: f64, height: f64, cells: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            cells: cells.max(1),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Strict overlap test; touching edges do not intersect
    pub fn intersects(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        x < self.right() && x + width > self.x && y < self.bottom() && y + height > self.y
    }

    /// Whether the horizontal span `[x, x + width)` overlaps this platform
    pub fn overlaps_horizontally(&self, x: f64, width: f64) -> bool {
        x + width > self.x && x < self.right()
    }

    /// A platform always has at least one cell
    pub fn cell_count(&self) -> usize {
        self.cells.max(1)
    }

    pub fn cell_width(&self) -> f64 {
        self.width / self.cell_count() as f64
    }

    /// Inclusive range of cells covered by the span `[left, right]`
    pub fn cell_range(&self, left: f64, right: f64) -> RangeInclusive<usize> {
        let cell_w = self.cell_width();
        let last = self.cell_count() - 1;
        let start = ((left - self.x) / cell_w).floor().max(0.0) as usize;
        let end = ((right - self.x) / cell_w).floor();
        let end = if end < 0.0 { 0 } else { (end as usize).min(last) };
        start.min(last)..=end
    }
}

/// Static arena geometry, immutable once a room starts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceModel {
    pub width: f64,
    pub height: f64,
    pub platforms: Vec<Platform>,
}

impl SurfaceModel {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            platforms: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    /// Highest x an actor may occupy
    pub fn max_x(&self) -> f64 {
        (self.width - ACTOR_WIDTH).max(0.0)
    }

    /// Highest y an actor may occupy
    pub fn max_y(&self) -> f64 {
        (self.height - ACTOR_HEIGHT).max(0.0)
    }

    pub fn total_cells(&self) -> usize {
        self.platforms.iter().map(|p| p.cells).sum()
    }

    /// Standard template: ground strip, symmetric lower and upper ledges,
    /// a wide mid platform and a small top platform. Cells are sized at
    /// roughly five units each so scoring is uniform across platforms.
    pub fn standard() -> Self {
        let w = ARENA_WIDTH;
        Self::new(ARENA_WIDTH, ARENA_HEIGHT)
            // ground
            .with_platform(Platform::new(0.0, 510.0, w, 30.0, 196))
            // lower ledges
            .with_platform(Platform::new(140.0, 440.0, 180.0, 22.0, 36))
            .with_platform(Platform::new(w - 140.0 - 180.0, 440.0, 180.0, 22.0, 36))
            // mid
            .with_platform(Platform::new((w - 320.0) / 2.0, 360.0, 320.0, 24.0, 64))
            // upper ledges
            .with_platform(Platform::new(120.0, 250.0, 200.0, 22.0, 40))
            .with_platform(Platform::new(w - 120.0 - 200.0, 250.0, 200.0, 22.0, 40))
            // top
            .with_platform(Platform::new((w - 160.0) / 2.0, 160.0, 160.0, 20.0, 32))
    }

    /// Spawn points for the standard template, standing on the upper
    /// ledges first and then on the mid platform edges
    pub fn standard_spawns() -> [(f64, f64); 4] {
        let w = ARENA_WIDTH;
        let mid_x = (w - 320.0) / 2.0;
        [
            (140.0 + 20.0, 250.0 - ACTOR_HEIGHT),
            (w - 120.0 - 44.0, 250.0 - ACTOR_HEIGHT),
            (mid_x + 10.0, 360.0 - ACTOR_HEIGHT),
            (mid_x + 320.0 - 34.0, 360.0 - ACTOR_HEIGHT),
        ]
    }
}

/// Build the standard surface and one actor per roster entry.
///
/// Spawn points are assigned in roster order and cycle when there are more
/// actors than spawn points. Duplicate ids or colors are rejected.
pub fn build(players: &[ActorSpec]) -> Result<(SurfaceModel, Vec<ActorState>), EngineError> {
    let mut ids = HashSet::new();
    let mut colors = HashSet::new();
    for spec in players {
        if !ids.insert(&spec.id) {
            return Err(EngineError::MalformedRoster(format!(
                "duplicate actor id {}",
                spec.id
            )));
        }
        if !colors.insert(spec.color) {
            return Err(EngineError::MalformedRoster(format!(
                "color {:?} assigned twice",
                spec.color
            )));
        }
    }

    let surface = SurfaceModel::standard();
    let spawns = SurfaceModel::standard_spawns();
    let actors = players
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let (x, y) = spawns[i % spawns.len()];
            ActorState::new(spec, x, y)
        })
        .collect();

    Ok((surface, actors))
}
