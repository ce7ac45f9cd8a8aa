//! Score persistence collaborators

pub mod scores;

pub use scores::{MemoryScoreSink, ScoreSink};
