//! Movement - maps a competitor's stats to per-tick displacement
//!
//! The model is consulted once per race to fix a competitor's `Pace` and
//! then once per tick by that competitor's worker. Randomness always comes
//! from the caller so races replay exactly under a fixed seed.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::game_server::runner::{Competitor, MAX_STAT};

/// How a competitor moves for the length of one race
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Pace {
    /// Player horse: effective speed derived from its stats
    Trained {
        rating: u32,
        ramp_ticks: u32,
        /// Fraction of speed lost by the finish line
        fatigue: f64,
        /// Half-width of the per-tick jitter
        jitter: f64,
    },
    /// Rival: fixed baseline drawn once per race
    Baseline { velocity: u32 },
}

/// What a worker knows about its runner when it asks for the next step
#[derive(Debug, Clone, Copy)]
pub struct RunnerView {
    pub pace: Pace,
    pub position: u32,
    /// Ticks already taken this race
    pub tick: u64,
}

/// Stats to displacement
pub trait MovementModel: Send + Sync {
    /// Fixes the competitor's pace for the coming race
    fn pace(&self, competitor: &Competitor, rng: &mut dyn RngCore) -> Pace;

    /// Distance covered during the next tick. Never carries the runner past
    /// `track_length`.
    fn advance(&self, runner: &RunnerView, track_length: u32, rng: &mut dyn RngCore) -> u32;
}

/// Limits a step so the position lands on the line at most
pub fn clamp_displacement(position: u32, displacement: u32, track_length: u32) -> u32 {
    displacement.min(track_length.saturating_sub(position))
}

/// Stat-weighted movement used by the game
#[derive(Debug, Clone)]
pub struct StatMovement {
    /// Rival baseline range, upper bound exclusive
    pub rival_velocity: (u32, u32),
    /// Rival per-tick jitter half-width
    pub rival_jitter: f64,
    /// Divides effective speed into track units per tick
    pub distance_scale: f64,
}

impl StatMovement {
    const MAX_FATIGUE: f64 = 0.20;
    const MAX_JITTER: f64 = 0.15;
    const STAMINA_JITTER_RELIEF: f64 = 0.10;
    const MAX_RAMP_TICKS: u32 = 1 + MAX_STAT / 20;
}

impl Default for StatMovement {
    fn default() -> Self {
        Self {
            rival_velocity: (40, 80),
            rival_jitter: 0.10,
            distance_scale: 10.0,
        }
    }
}

impl MovementModel for StatMovement {
    fn pace(&self, competitor: &Competitor, rng: &mut dyn RngCore) -> Pace {
        if !competitor.controlled {
            let (low, high) = self.rival_velocity;
            return Pace::Baseline {
                velocity: rng.gen_range(low..high),
            };
        }

        let stats = competitor.stats;
        let stamina = f64::from(stats.stamina.min(MAX_STAT)) / f64::from(MAX_STAT);
        Pace::Trained {
            rating: (6 * stats.speed + 3 * stats.acceleration + stats.stamina) / 10,
            ramp_ticks: Self::MAX_RAMP_TICKS - stats.acceleration.min(MAX_STAT) / 20,
            fatigue: Self::MAX_FATIGUE * (1.0 - stamina),
            jitter: Self::MAX_JITTER - Self::STAMINA_JITTER_RELIEF * stamina,
        }
    }

    fn advance(&self, runner: &RunnerView, track_length: u32, rng: &mut dyn RngCore) -> u32 {
        let effective = match runner.pace {
            Pace::Baseline { velocity } => {
                f64::from(velocity) * jitter(rng, self.rival_jitter)
            }
            Pace::Trained {
                rating,
                ramp_ticks,
                fatigue,
                jitter: spread,
            } => {
                let ramp = ((runner.tick + 1) as f64 / f64::from(ramp_ticks.max(1))).min(1.0);
                let progress = f64::from(runner.position) / f64::from(track_length.max(1));
                let decay = if progress > 0.5 {
                    1.0 - fatigue * (progress - 0.5) * 2.0
                } else {
                    1.0
                };
                f64::from(rating) * ramp * decay * jitter(rng, spread)
            }
        };

        let step = (effective / self.distance_scale).round().max(1.0) as u32;
        clamp_displacement(runner.position, step, track_length)
    }
}

/// Multiplier in `[1 - spread, 1 + spread)`
fn jitter(rng: &mut dyn RngCore, spread: f64) -> f64 {
    if spread <= 0.0 {
        return 1.0;
    }
    1.0 + rng.gen_range(-spread..spread)
}
