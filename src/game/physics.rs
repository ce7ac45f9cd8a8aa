//! Platformer physics: integration, platform collision, ground contact

use super::actor::{ACTOR_HEIGHT, ACTOR_WIDTH};
use super::arena::SurfaceModel;

/// Movement constants for arena actors
#[derive(Debug, Clone, Copy)]
pub struct MovementStats {
    /// Downward acceleration (units/s²)
    pub gravity: f64,
    /// Horizontal speed cap (units/s)
    pub max_speed: f64,
    /// Horizontal acceleration while a direction is held (units/s²)
    pub acceleration: f64,
    /// Vertical velocity applied on jump (negative is up)
    pub jump_velocity: f64,
    /// Per-tick velocity multiplier when no direction is held
    pub friction: f64,
    /// Below this speed friction snaps velocity to zero
    pub stop_threshold: f64,
    /// Above this speed an actor counts as moving horizontally
    pub moving_threshold: f64,
    /// Max gap between feet and a platform top that still counts as standing
    pub ground_tolerance: f64,
    /// Max gap between feet and the floor bound that counts as standing
    pub floor_tolerance: f64,
}

impl Default for MovementStats {
    fn default() -> Self {
        Self {
            gravity: 2400.0,
            max_speed: 300.0,
            acceleration: 3200.0,
            jump_velocity: -820.0,
            friction: 0.90,
            stop_threshold: 10.0,
            moving_threshold: 1.0,
            ground_tolerance: 3.0,
            floor_tolerance: 0.5,
        }
    }
}

/// Result of the vertical move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMove {
    pub y: f64,
    pub vy: f64,
    /// Platform landed on this tick, if any
    pub landed_on: Option<usize>,
}

/// Ground contact after movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundContact {
    pub grounded: bool,
    /// Platform the actor stands on (painting happens only here)
    pub platform: Option<usize>,
}

/// Physics system for arena actors
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply input acceleration or friction and clamp to max speed
    pub fn integrate_horizontal(vx: f64, direction: i8, dt: f64, stats: &MovementStats) -> f64 {
        let accel = f64::from(direction) * stats.acceleration;
        let mut vx = vx + accel * dt;

        if direction == 0 {
            vx *= stats.friction;
            if vx.abs() < stats.stop_threshold {
                vx = 0.0;
            }
        }

        vx.clamp(-stats.max_speed, stats.max_speed)
    }

    /// Apply a jump (only from the ground) and then gravity
    pub fn integrate_vertical(
        vy: f64,
        jump: bool,
        grounded: bool,
        dt: f64,
        stats: &MovementStats,
    ) -> f64 {
        let vy = if jump && grounded { stats.jump_velocity } else { vy };
        vy + stats.gravity * dt
    }

    /// Move horizontally, stopping at the side of the first platform hit.
    /// Returns (new_x, new_vx).
    pub fn move_horizontal(
        x: f64,
        y: f64,
        vx: f64,
        dt: f64,
        surface: &SurfaceModel,
    ) -> (f64, f64) {
        let mut new_x = x + vx * dt;
        let mut vx = vx;

        for platform in &surface.platforms {
            if platform.intersects(new_x, y, ACTOR_WIDTH, ACTOR_HEIGHT) {
                if vx > 0.0 {
                    new_x = platform.x - ACTOR_WIDTH;
                } else if vx < 0.0 {
                    new_x = platform.right();
                }
                vx = 0.0;
            }
        }

        (new_x.clamp(0.0, surface.max_x()), vx)
    }

    /// Move vertically, resting on top of platforms when falling and
    /// below them when rising
    pub fn move_vertical(x: f64, y: f64, vy: f64, dt: f64, surface: &SurfaceModel) -> VerticalMove {
        let mut new_y = y + vy * dt;
        let mut vy = vy;
        let mut landed_on = None;

        for (idx, platform) in surface.platforms.iter().enumerate() {
            if platform.intersects(x, new_y, ACTOR_WIDTH, ACTOR_HEIGHT) {
                if vy > 0.0 {
                    new_y = platform.y - ACTOR_HEIGHT;
                    landed_on = Some(idx);
                } else if vy < 0.0 {
                    new_y = platform.bottom();
                }
                vy = 0.0;
            }
        }

        // Bounds act like a ceiling and a floor
        let max_y = surface.max_y();
        if (new_y >= max_y && vy > 0.0) || (new_y <= 0.0 && vy < 0.0) {
            vy = 0.0;
        }

        VerticalMove {
            y: new_y.clamp(0.0, max_y),
            vy,
            landed_on,
        }
    }

    /// Platform whose top is within tolerance of the actor's feet
    pub fn platform_underfoot(
        x: f64,
        y: f64,
        surface: &SurfaceModel,
        stats: &MovementStats,
    ) -> Option<usize> {
        let feet = y + ACTOR_HEIGHT;
        surface.platforms.iter().position(|platform| {
            platform.overlaps_horizontally(x, ACTOR_WIDTH)
                && (feet - platform.y).abs() <= stats.ground_tolerance
        })
    }

    /// Grounded if the actor landed this tick, stands within tolerance of
    /// a platform top, or touches the floor bound
    pub fn ground_contact(
        x: f64,
        y: f64,
        landed_on: Option<usize>,
        surface: &SurfaceModel,
        stats: &MovementStats,
    ) -> GroundContact {
        let platform = landed_on.or_else(|| Self::platform_underfoot(x, y, surface, stats));
        let on_floor = y >= surface.max_y() - stats.floor_tolerance;
        GroundContact {
            grounded: platform.is_some() || on_floor,
            platform,
        }
    }

    pub fn is_moving(vx: f64, stats: &MovementStats) -> bool {
        vx.abs() > stats.moving_threshold
    }
}
