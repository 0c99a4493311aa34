//! Economy - upgrade pricing, leveling and race rewards

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::game_server::config::EconomyConfig;
use crate::game_server::error::UpgradeError;
use crate::game_server::race::{RaceOutcome, RaceStatus};
use crate::game_server::runner::{Competitor, Stat, MAX_STAT};

/// Stat value up to which upgrades cost the base price
const FREE_TIER: u32 = 50;
/// Stat points per price increment
const PRICE_BAND: u32 = 10;

/// Total stats of a fresh level 1 competitor
const LEVEL_BASE_TOTAL: u32 = 150;
/// Total stats per additional level
const LEVEL_SPAN: u32 = 30;

/// Price of the next upgrade for a stat currently at `stat`
pub fn upgrade_cost(stat: u32, base_cost: u32, increment: u32) -> u32 {
    base_cost + stat.saturating_sub(FREE_TIER) / PRICE_BAND * increment
}

/// Level implied by a stat total
pub fn evaluate_level(total_stats: u32) -> u32 {
    total_stats.saturating_sub(LEVEL_BASE_TOTAL) / LEVEL_SPAN + 1
}

/// Coins for a 0-based finishing place under the stock payout table
pub fn reward(placement: usize) -> u32 {
    match placement {
        0 => 100,
        1 => 50,
        2 => 25,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub from: u32,
    pub to: u32,
}

/// What a successful purchase changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    pub stat: Stat,
    pub old_value: u32,
    pub new_value: u32,
    pub cost: u32,
    pub coins_left: u32,
    pub level_up: Option<LevelUp>,
}

/// History line for one race, for the host to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    /// 1-based position in the session's history; 0 until a session numbers it
    pub race_number: u32,
    /// Wall clock at settlement, milliseconds since the Unix epoch
    pub recorded_at_ms: u64,
    pub competitor: String,
    /// 1-based; `None` when the competitor did not finish
    pub placement: Option<u32>,
    pub total_racers: u32,
    pub coins_earned: u32,
    pub status: RaceStatus,
}

/// Result of paying out a race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub coins_earned: u32,
    /// Absent when the roster had no controlled competitor
    pub record: Option<RaceRecord>,
}

/// Progression rules bound to a configuration
#[derive(Debug, Clone, Default)]
pub struct Economy {
    config: EconomyConfig,
}

impl Economy {
    pub fn new(config: EconomyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Effective stat ceiling; a config can lower it but never lift it past `MAX_STAT`
    pub fn max_stat(&self) -> u32 {
        self.config.max_stat.min(MAX_STAT)
    }

    /// Price shown for upgrading `stat`, or `None` once it is maxed
    pub fn quote(&self, competitor: &Competitor, stat: Stat) -> Option<u32> {
        let value = competitor.stats.get(stat);
        if value >= self.max_stat() {
            return None;
        }
        let price = self.config.price(stat);
        Some(upgrade_cost(value, price.base_cost, price.increment))
    }

    /// Buys one upgrade step. On error the competitor is unchanged.
    pub fn purchase_upgrade(
        &self,
        competitor: &mut Competitor,
        stat: Stat,
    ) -> Result<UpgradeReceipt, UpgradeError> {
        let max = self.max_stat();
        let cost = self
            .quote(competitor, stat)
            .ok_or(UpgradeError::StatMaxed { stat, max })?;

        if competitor.coins < cost {
            log::warn!(
                "{} cannot afford {} upgrade: {} < {}",
                competitor.name,
                stat,
                competitor.coins,
                cost
            );
            return Err(UpgradeError::InsufficientFunds {
                stat,
                cost,
                available: competitor.coins,
            });
        }

        let old_value = competitor.stats.get(stat);
        let new_value = old_value.saturating_add(self.config.upgrade_step).min(max);
        competitor.coins -= cost;
        competitor.stats.set(stat, new_value);

        let level_up = competitor.refresh_level().map(|from| LevelUp {
            from,
            to: competitor.level,
        });
        if let Some(up) = level_up {
            log::info!("{} leveled up: {} -> {}", competitor.name, up.from, up.to);
        }

        Ok(UpgradeReceipt {
            stat,
            old_value,
            new_value,
            cost,
            coins_left: competitor.coins,
            level_up,
        })
    }

    /// Coins for a 0-based finishing place under this configuration
    pub fn reward(&self, placement: usize) -> u32 {
        self.config
            .placement_rewards
            .get(placement)
            .copied()
            .unwrap_or(0)
    }

    /// Pays the controlled competitor for its placement and returns the
    /// history record. `roster` must be the one the race ran with.
    pub fn settle(&self, roster: &mut [Competitor], outcome: &RaceOutcome) -> Settlement {
        let total_racers = roster.len() as u32;
        let Some(player) = roster.iter_mut().find(|c| c.controlled) else {
            return Settlement {
                coins_earned: 0,
                record: None,
            };
        };

        let placement = outcome.controlled_placement();
        let coins_earned = placement.map_or(0, |place| self.reward(place));
        player.coins = player.coins.saturating_add(coins_earned);
        log::info!(
            "{} placed {:?}, earned {} coins (balance {})",
            player.name,
            placement.map(|p| p + 1),
            coins_earned,
            player.coins
        );

        Settlement {
            coins_earned,
            record: Some(RaceRecord {
                race_number: 0,
                recorded_at_ms: now_ms(),
                competitor: player.name.clone(),
                placement: placement.map(|p| p as u32 + 1),
                total_racers,
                coins_earned,
                status: outcome.status,
            }),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
