//! Configuration for races and the progression economy
//!
//! Every section has a `Default` matching the stock game, so a config file
//! only needs to name the values it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game_server::error::{ConfigError, RaceError};
use crate::game_server::runner::{Stat, MAX_STAT};

/// Race configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Distance a competitor must cover to finish
    pub track_length: u32,
    /// Number of competitors, controlled one included
    pub runner_count: u32,
    /// Pause between two ticks of a worker
    pub tick_interval_ms: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            track_length: 600,
            runner_count: 5,
            tick_interval_ms: 30,
        }
    }
}

impl RaceConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Checks the values that must hold before any race starts
    pub fn validate(&self) -> Result<(), RaceError> {
        if self.track_length == 0 {
            return Err(RaceError::InvalidTrackLength);
        }
        if self.runner_count == 0 {
            return Err(RaceError::EmptyRoster);
        }
        Ok(())
    }
}

/// Price schedule for one stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePrice {
    pub base_cost: u32,
    pub increment: u32,
}

/// Constants of the progression economy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub speed: UpgradePrice,
    pub stamina: UpgradePrice,
    pub acceleration: UpgradePrice,
    /// Amount a single purchase adds to a stat
    pub upgrade_step: u32,
    /// Stat ceiling
    pub max_stat: u32,
    /// Coins paid for 1st, 2nd, 3rd... place; later places earn nothing
    pub placement_rewards: Vec<u32>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            speed: UpgradePrice { base_cost: 70, increment: 15 },
            stamina: UpgradePrice { base_cost: 60, increment: 12 },
            acceleration: UpgradePrice { base_cost: 55, increment: 10 },
            upgrade_step: 10,
            max_stat: MAX_STAT,
            placement_rewards: vec![100, 50, 25],
        }
    }
}

impl EconomyConfig {
    pub fn price(&self, stat: Stat) -> UpgradePrice {
        match stat {
            Stat::Speed => self.speed,
            Stat::Stamina => self.stamina,
            Stat::Acceleration => self.acceleration,
        }
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub race: RaceConfig,
    pub economy: EconomyConfig,
}

impl GameConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.race.track_length == 0 {
            return Err(ConfigError::Invalid {
                field: "race.track_length",
                reason: "must be positive".to_string(),
            });
        }
        if self.race.runner_count == 0 {
            return Err(ConfigError::Invalid {
                field: "race.runner_count",
                reason: "must be positive".to_string(),
            });
        }
        if self.economy.upgrade_step == 0 {
            return Err(ConfigError::Invalid {
                field: "economy.upgrade_step",
                reason: "must be positive".to_string(),
            });
        }
        if self.economy.max_stat == 0 || self.economy.max_stat > MAX_STAT {
            return Err(ConfigError::Invalid {
                field: "economy.max_stat",
                reason: format!("must be within 1..={MAX_STAT}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_game() {
        let config = GameConfig::default();
        assert_eq!(config.race.runner_count, 5);
        assert_eq!(config.race.tick_interval(), Duration::from_millis(30));
        assert_eq!(config.economy.price(Stat::Speed), UpgradePrice { base_cost: 70, increment: 15 });
        assert_eq!(config.economy.price(Stat::Stamina), UpgradePrice { base_cost: 60, increment: 12 });
        assert_eq!(
            config.economy.price(Stat::Acceleration),
            UpgradePrice { base_cost: 55, increment: 10 }
        );
        assert_eq!(config.economy.upgrade_step, 10);
        assert_eq!(config.economy.max_stat, 200);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GameConfig::from_json_str(r#"{ "race": { "track_length": 900 } }"#).unwrap();
        assert_eq!(config.race.track_length, 900);
        assert_eq!(config.race.runner_count, 5);
        assert_eq!(config.economy, EconomyConfig::default());
    }

    #[test]
    fn test_rejects_zero_track_length() {
        let err = GameConfig::from_json_str(r#"{ "race": { "track_length": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "race.track_length", .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = GameConfig::from_json_str("{ race: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GameConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_race_config_validate() {
        assert!(RaceConfig::default().validate().is_ok());
        let config = RaceConfig { track_length: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(RaceError::InvalidTrackLength));
    }
}
