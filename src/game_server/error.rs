//! Error types for the race engine

use thiserror::Error;

use crate::game_server::runner::Stat;

/// Errors raised while setting up or supervising a race
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaceError {
    #[error("track length must be positive")]
    InvalidTrackLength,

    #[error("roster is empty")]
    EmptyRoster,

    #[error("roster has no controlled competitor")]
    NoControlled,

    #[error("roster has {count} controlled competitors, exactly one is allowed")]
    MultipleControlled { count: usize },

    #[error("{name}: {stat} is {value}, outside 0..={max}")]
    StatOutOfRange {
        name: String,
        stat: Stat,
        value: u32,
        max: u32,
    },

    #[error("a race is already running")]
    AlreadyRunning,

    #[error("no race has been initialized")]
    NoActiveRace,

    #[error("race worker for {name} panicked")]
    WorkerPanicked { name: String },
}

/// Errors raised by an upgrade purchase. State is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpgradeError {
    #[error("{stat} is already at the maximum of {max}")]
    StatMaxed { stat: Stat, max: u32 },

    #[error("need {cost} coins to upgrade {stat}, have {available}")]
    InsufficientFunds { stat: Stat, cost: u32, available: u32 },

    #[error("cannot upgrade {stat} while a race is running")]
    RaceInProgress { stat: Stat },
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
