//! Time utilities for the arena simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Milliseconds since the Unix epoch for a session timestamp
pub fn to_millis(at: DateTime<Utc>) -> u64 {
    at.timestamp_millis().max(0) as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Delta time in seconds for a fixed tick length
pub fn tick_delta(tick: Duration) -> f64 {
    tick.as_secs_f64()
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_duration() {
        let dt = tick_delta(Duration::from_millis(8));
        assert!((dt - 0.008).abs() < 1e-12);
    }

    #[test]
    fn to_millis_never_negative() {
        let before_epoch = DateTime::<Utc>::from_timestamp(-5, 0).unwrap();
        assert_eq!(to_millis(before_epoch), 0);
        let at = DateTime::<Utc>::from_timestamp(2, 500_000_000).unwrap();
        assert_eq!(to_millis(at), 2_500);
    }
}
