//! Latched player input shared between network handlers and the tick

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::ActorId;

const LEFT: u8 = 0b001;
const RIGHT: u8 = 0b010;
const JUMP: u8 = 0b100;

/// One input message: held directions plus a jump press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl ArenaInput {
    pub fn new(left: bool, right: bool, jump: bool) -> Self {
        Self { left, right, jump }
    }

    /// -1 for left, +1 for right, 0 when neither or both are held
    pub fn direction(&self) -> i8 {
        match (self.left, self.right) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }

    fn to_bits(self) -> u8 {
        (if self.left { LEFT } else { 0 })
            | (if self.right { RIGHT } else { 0 })
            | (if self.jump { JUMP } else { 0 })
    }

    fn from_bits(bits: u8) -> Self {
        Self {
            left: bits & LEFT != 0,
            right: bits & RIGHT != 0,
            jump: bits & JUMP != 0,
        }
    }
}

/// Latest input for one actor packed into a single atomic byte, so a
/// reader always sees one complete message.
///
/// Held directions are overwritten by each message. A jump press stays
/// latched until the tick takes it.
#[derive(Debug, Default)]
pub struct LatchedInput {
    bits: AtomicU8,
}

impl LatchedInput {
    pub fn store(&self, input: ArenaInput) {
        let incoming = input.to_bits();
        // fetch_update only fails when the closure returns None
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some(incoming | (old & JUMP))
            });
    }

    /// Read the latched input and clear the jump edge
    pub fn take(&self) -> ArenaInput {
        ArenaInput::from_bits(self.bits.fetch_and(!JUMP, Ordering::AcqRel))
    }

    pub fn peek(&self) -> ArenaInput {
        ArenaInput::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Input latches for every actor of a room. The actor set is fixed when
/// the room starts, so lookups never lock.
#[derive(Debug, Default)]
pub struct InputBuffer {
    latches: HashMap<ActorId, LatchedInput>,
}

impl InputBuffer {
    pub fn new(actors: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            latches: actors
                .into_iter()
                .map(|id| (id, LatchedInput::default()))
                .collect(),
        }
    }

    /// Latch `input` for `actor`; returns false for an unknown actor
    pub fn submit(&self, actor: &ActorId, input: ArenaInput) -> bool {
        match self.latches.get(actor) {
            Some(latch) => {
                latch.store(input);
                true
            }
            None => false,
        }
    }

    pub fn take(&self, actor: &ActorId) -> ArenaInput {
        self.latches
            .get(actor)
            .map(LatchedInput::take)
            .unwrap_or_default()
    }

    pub fn peek(&self, actor: &ActorId) -> ArenaInput {
        self.latches
            .get(actor)
            .map(LatchedInput::peek)
            .unwrap_or_default()
    }

    pub fn contains(&self, actor: &ActorId) -> bool {
        self.latches.contains_key(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_is_edge_triggered() {
        let latch = LatchedInput::default();
        latch.store(ArenaInput::new(false, true, true));
        let first = latch.take();
        assert!(first.jump && first.right);
        let second = latch.take();
        assert!(!second.jump);
        assert!(second.right, "held direction survives the take");
    }

    #[test]
    fn later_message_does_not_cancel_pending_jump() {
        let latch = LatchedInput::default();
        latch.store(ArenaInput::new(false, false, true));
        latch.store(ArenaInput::new(true, false, false));
        let taken = latch.take();
        assert!(taken.jump);
        assert!(taken.left);
    }

    #[test]
    fn directions_are_overwritten() {
        let latch = LatchedInput::default();
        latch.store(ArenaInput::new(true, false, false));
        latch.store(ArenaInput::new(false, true, false));
        assert_eq!(latch.peek(), ArenaInput::new(false, true, false));
    }

    #[test]
    fn direction_cancels_when_both_held() {
        assert_eq!(ArenaInput::new(true, true, false).direction(), 0);
        assert_eq!(ArenaInput::new(true, false, false).direction(), -1);
        assert_eq!(ArenaInput::new(false, true, false).direction(), 1);
    }

    #[test]
    fn unknown_actor_is_rejected() {
        let buffer = InputBuffer::new([ActorId::from("a")]);
        assert!(buffer.submit(&ActorId::from("a"), ArenaInput::new(true, false, false)));
        assert!(!buffer.submit(&ActorId::from("ghost"), ArenaInput::default()));
        assert_eq!(buffer.take(&ActorId::from("ghost")), ArenaInput::default());
    }
}
