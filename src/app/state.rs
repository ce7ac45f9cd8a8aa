//! Application state shared across tasks

use std::sync::Arc;

use crate::config::Config;
use crate::room::{BroadcastPublisher, RoomManager};
use crate::store::MemoryScoreSink;

/// Frames buffered per subscriber before it starts lagging
const PUBLISH_CAPACITY: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub publisher: Arc<BroadcastPublisher>,
    pub scores: Arc<MemoryScoreSink>,
    pub rooms: RoomManager,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let seed = config.seed.unwrap_or_else(rand::random);

        let publisher = Arc::new(BroadcastPublisher::new(PUBLISH_CAPACITY));
        let scores = Arc::new(MemoryScoreSink::new());
        let rooms = RoomManager::new(config.engine.clone(), seed, publisher.clone(), scores.clone());

        Self {
            config,
            publisher,
            scores,
            rooms,
        }
    }
}
