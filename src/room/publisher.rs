//! Fire-and-forget frame delivery

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::protocol::Frame;

/// Delivers a frame to everyone subscribed to a topic. Delivery is at
/// most once and must never block the caller.
pub trait FramePublisher: Send + Sync {
    fn publish(&self, topic: &str, frame: Frame);
}

/// A frame with the topic it was published on
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub frame: Frame,
}

/// Publisher backed by a tokio broadcast channel. Slow receivers lag and
/// lose frames; with no receivers frames are discarded.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Published>,
    sent: AtomicU64,
    unobserved: AtomicU64,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sent: AtomicU64::new(0),
            unobserved: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames published while nobody was listening
    pub fn unobserved(&self) -> u64 {
        self.unobserved.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl FramePublisher for BroadcastPublisher {
    fn publish(&self, topic: &str, frame: Frame) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let published = Published {
            topic: topic.to_string(),
            frame,
        };
        if self.tx.send(published).is_err() {
            self.unobserved.fetch_add(1, Ordering::Relaxed);
        }
    }
}
