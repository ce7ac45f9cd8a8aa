//! Paint Arena - authoritative real-time engine for a territory-painting
//! multiplayer arena
//!
//! - `game`: per-room physics, painting and scoring
//! - `room`: lobby, round scheduling, broadcasts and teardown
//! - `util`: time helpers and input rate limiting

pub mod app;
pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod room;
pub mod store;
pub mod util;

pub use error::{EngineError, SinkError};
