//! Game Server Module
//!
//! Concurrent race simulation and the progression economy around it.
//! One OS thread per competitor; the finish ledger is the only point where
//! workers serialize.

pub mod config;
pub mod economy;
pub mod error;
pub mod ledger;
pub mod movement;
pub mod race;
pub mod runner;
pub mod simulation;

pub use config::{EconomyConfig, GameConfig, RaceConfig, UpgradePrice};
pub use economy::{
    evaluate_level, reward, upgrade_cost, Economy, LevelUp, RaceRecord, Settlement, UpgradeReceipt,
};
pub use error::{ConfigError, RaceError, UpgradeError};
pub use ledger::{FinishEntry, FinishLedger};
pub use movement::{clamp_displacement, MovementModel, Pace, RunnerView, StatMovement};
pub use race::{
    run_race, run_race_with, CancelToken, RaceOutcome, RaceSnapshot, RaceStatus, RunningRace,
};
pub use runner::{Competitor, RaceState, Roster, RunnerSnapshot, Stat, Stats, MAX_STAT};
pub use simulation::{GameState, RaceServer, ServerStats};
