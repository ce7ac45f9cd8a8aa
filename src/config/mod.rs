//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::{INPUT_RATE_LIMIT, INPUT_RATE_WINDOW_MS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Seed for codes, colors and bots; random when unset
    pub seed: Option<u64>,
    /// Bot-only rooms the runner keeps alive
    pub demo_rooms: usize,
    pub engine: EngineConfig,
}

/// Room timings and ingress limits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Fixed simulation step
    pub tick: Duration,
    pub position_broadcast: Duration,
    pub paint_broadcast: Duration,
    /// Length of a round once it starts
    pub round: Duration,
    /// How long a room waits for players before starting on its own
    pub join_window: Duration,
    /// Inputs admitted per actor and window
    pub input_rate_limit: u32,
    pub input_rate_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(8),
            position_broadcast: Duration::from_millis(22),
            paint_broadcast: Duration::from_millis(150),
            round: Duration::from_secs(60),
            join_window: Duration::from_secs(60),
            input_rate_limit: INPUT_RATE_LIMIT,
            input_rate_window: Duration::from_millis(INPUT_RATE_WINDOW_MS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse_positive(&lookup, key, default.as_millis() as u64).map(Duration::from_millis)
        };
        let secs = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse_positive(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        let engine = EngineConfig {
            tick: millis("TICK_MS", defaults.tick)?,
            position_broadcast: millis("POSITION_BROADCAST_MS", defaults.position_broadcast)?,
            paint_broadcast: millis("PAINT_BROADCAST_MS", defaults.paint_broadcast)?,
            round: secs("ROUND_SECS", defaults.round)?,
            join_window: secs("JOIN_WINDOW_SECS", defaults.join_window)?,
            input_rate_limit: parse_positive(&lookup, "INPUT_RATE_LIMIT", u64::from(defaults.input_rate_limit))
                .and_then(|n| u32::try_from(n).map_err(|_| invalid("INPUT_RATE_LIMIT", n.to_string())))?,
            input_rate_window: millis("INPUT_RATE_WINDOW_MS", defaults.input_rate_window)?,
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            seed: lookup("ENGINE_SEED").map(|v| parse("ENGINE_SEED", &v)).transpose()?,
            demo_rooms: lookup("DEMO_ROOMS")
                .map(|v| parse("DEMO_ROOMS", &v))
                .transpose()?
                .unwrap_or(1),
            engine,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value.to_string()))
}

fn parse_positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match parse::<u64>(key, &value)? {
            0 => Err(invalid(key, value)),
            n => Ok(n),
        },
    }
}

fn invalid(key: &'static str, value: String) -> ConfigError {
    ConfigError::Invalid { key, value }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
