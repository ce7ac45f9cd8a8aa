//! Rate limiting utilities

use dashmap::DashMap;

use crate::game::{ActorId, RoomCode};
use crate::util::time::unix_millis;

/// Input rate limit for the continuous arena path (messages per window)
pub const INPUT_RATE_LIMIT: u32 = 20;

/// Window length for input rate limiting
pub const INPUT_RATE_WINDOW_MS: u64 = 1_000;

/// Fixed window bookkeeping for one (room, actor) key
#[derive(Debug, Clone, Copy)]
struct Window {
    start_ms: u64,
    count: u32,
}

/// Per-(room, actor) fixed-window admission control for input messages.
///
/// Each key gets `capacity` admissions per `window_ms`. Once the window is
/// full further calls are rejected without touching the count; the window
/// restarts on the first call made `window_ms` or more after it opened.
/// Checks for one key serialize on the map shard, so concurrent handlers
/// never over-admit.
pub struct InputRateLimiter {
    windows: DashMap<(RoomCode, ActorId), Window>,
    capacity: u32,
    window_ms: u64,
}

impl InputRateLimiter {
    pub fn new(capacity: u32, window_ms: u64) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
            window_ms: window_ms.max(1),
        }
    }

    /// Check if an input from `actor` in `room` is allowed right now
    pub fn allow(&self, room: &RoomCode, actor: &ActorId) -> bool {
        self.allow_at(room, actor, unix_millis())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading
    pub fn allow_at(&self, room: &RoomCode, actor: &ActorId, now_ms: u64) -> bool {
        let mut window = self
            .windows
            .entry((room.clone(), actor.clone()))
            .or_insert(Window {
                start_ms: now_ms,
                count: 0,
            });

        if now_ms.saturating_sub(window.start_ms) >= self.window_ms {
            window.start_ms = now_ms;
            window.count = 0;
        }

        if window.count >= self.capacity {
            return false;
        }

        window.count += 1;
        true
    }

    /// Drop every key belonging to `room`
    pub fn forget_room(&self, room: &RoomCode) {
        self.windows.retain(|(key_room, _), _| key_room != room);
    }

    /// Remove windows that have not been reopened for `max_age_ms`
    pub fn cleanup(&self, now_ms: u64, max_age_ms: u64) {
        self.windows
            .retain(|_, window| now_ms.saturating_sub(window.start_ms) < max_age_ms);
    }

    /// Number of (room, actor) windows currently held
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl Default for InputRateLimiter {
    fn default() -> Self {
        Self::new(INPUT_RATE_LIMIT, INPUT_RATE_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key() -> (RoomCode, ActorId) {
        (RoomCode::from("ROOM01"), ActorId::from("p1"))
    }

    #[test]
    fn twentieth_allowed_twenty_first_rejected() {
        let limiter = InputRateLimiter::default();
        let (room, actor) = key();
        for i in 0..20 {
            assert!(limiter.allow_at(&room, &actor, 1_000 + i), "call {} rejected", i + 1);
        }
        assert!(!limiter.allow_at(&room, &actor, 1_050));
        assert!(!limiter.allow_at(&room, &actor, 1_999));
    }

    #[test]
    fn rejection_does_not_extend_window() {
        let limiter = InputRateLimiter::new(2, 1_000);
        let (room, actor) = key();
        assert!(limiter.allow_at(&room, &actor, 0));
        assert!(limiter.allow_at(&room, &actor, 10));
        for t in [20, 500, 999] {
            assert!(!limiter.allow_at(&room, &actor, t));
        }
        // Window opened at 0, so 1000 is a fresh window
        assert!(limiter.allow_at(&room, &actor, 1_000));
        assert!(limiter.allow_at(&room, &actor, 1_001));
        assert!(!limiter.allow_at(&room, &actor, 1_002));
    }

    #[test]
    fn calls_succeed_again_after_window() {
        let limiter = InputRateLimiter::default();
        let (room, actor) = key();
        for _ in 0..20 {
            assert!(limiter.allow_at(&room, &actor, 5_000));
        }
        assert!(!limiter.allow_at(&room, &actor, 5_999));
        assert!(limiter.allow_at(&room, &actor, 6_001));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = InputRateLimiter::new(1, 1_000);
        let room = RoomCode::from("ROOM01");
        let other_room = RoomCode::from("ROOM02");
        let a = ActorId::from("a");
        let b = ActorId::from("b");
        assert!(limiter.allow_at(&room, &a, 0));
        assert!(!limiter.allow_at(&room, &a, 1));
        assert!(limiter.allow_at(&room, &b, 1));
        assert!(limiter.allow_at(&other_room, &a, 1));
    }

    #[test]
    fn concurrent_callers_never_over_admit() {
        let limiter = Arc::new(InputRateLimiter::new(20, 60_000));
        let (room, actor) = key();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let room = room.clone();
                let actor = actor.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.allow_at(&room, &actor, 100))
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 20);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn forget_room_only_drops_that_room() {
        let limiter = InputRateLimiter::default();
        let room = RoomCode::from("ROOM01");
        let other = RoomCode::from("ROOM02");
        let actor = ActorId::from("p1");
        limiter.allow_at(&room, &actor, 0);
        limiter.allow_at(&other, &actor, 0);
        assert_eq!(limiter.tracked_keys(), 2);
        limiter.forget_room(&room);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn cleanup_removes_stale_windows() {
        let limiter = InputRateLimiter::default();
        let (room, actor) = key();
        limiter.allow_at(&room, &actor, 0);
        limiter.cleanup(10_000, 60_000);
        assert_eq!(limiter.tracked_keys(), 1);
        limiter.cleanup(70_000, 60_000);
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
