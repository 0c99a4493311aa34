//! Runner - Competitor identity, stats and race state
//!
//! A `Competitor` is the value the host owns and persists between races.
//! While a race runs, each competitor's position lives in a `LiveRunner`
//! that only its own worker writes; the final values are copied back into
//! the roster once the race is joined.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::game_server::economy::evaluate_level;
use crate::game_server::error::RaceError;

/// Stat ceiling
pub const MAX_STAT: u32 = 200;

/// Value every stat starts at for a fresh competitor
pub const STARTING_STAT: u32 = 50;

/// Stock rival names, in lane order
pub const RIVAL_NAMES: [&str; 5] = ["Cuki", "Suki", "Oming", "Mujaer", "Jaki"];

/// Upgradable stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Speed,
    Stamina,
    Acceleration,
}

impl Stat {
    pub const ALL: [Stat; 3] = [Stat::Speed, Stat::Stamina, Stat::Acceleration];
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stat::Speed => "speed",
            Stat::Stamina => "stamina",
            Stat::Acceleration => "acceleration",
        };
        f.write_str(name)
    }
}

/// Speed, stamina and acceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub speed: u32,
    pub stamina: u32,
    pub acceleration: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            speed: STARTING_STAT,
            stamina: STARTING_STAT,
            acceleration: STARTING_STAT,
        }
    }
}

impl Stats {
    pub fn new(speed: u32, stamina: u32, acceleration: u32) -> Self {
        Self { speed, stamina, acceleration }
    }

    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Speed => self.speed,
            Stat::Stamina => self.stamina,
            Stat::Acceleration => self.acceleration,
        }
    }

    pub fn set(&mut self, stat: Stat, value: u32) {
        match stat {
            Stat::Speed => self.speed = value,
            Stat::Stamina => self.stamina = value,
            Stat::Acceleration => self.acceleration = value,
        }
    }

    pub fn total(&self) -> u32 {
        self.speed + self.stamina + self.acceleration
    }
}

/// Per-race state, reset at the start of every race
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceState {
    /// Distance covered, never past the track length
    pub position: u32,
    /// Set once the finish line is crossed
    pub finished: bool,
    /// Presentation lane; no effect on the simulation
    pub lane: u32,
}

/// A racing entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    /// Whether this competitor's placement pays out to the player
    pub controlled: bool,
    pub stats: Stats,
    pub level: u32,
    pub coins: u32,
    #[serde(default)]
    pub race: RaceState,
}

impl Competitor {
    /// A player-controlled competitor at starting stats
    pub fn controlled(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// A simulated rival at starting stats
    pub fn simulated(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    fn new(name: impl Into<String>, controlled: bool) -> Self {
        let stats = Stats::default();
        Self {
            name: name.into(),
            controlled,
            stats,
            level: evaluate_level(stats.total()),
            coins: 0,
            race: RaceState::default(),
        }
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self.level = self.level.max(evaluate_level(stats.total()));
        self
    }

    pub fn with_coins(mut self, coins: u32) -> Self {
        self.coins = coins;
        self
    }

    /// Raises the stored level to match current stats. Never lowers it.
    /// Returns the previous level when it changed.
    pub fn refresh_level(&mut self) -> Option<u32> {
        let computed = evaluate_level(self.stats.total());
        if computed > self.level {
            let previous = self.level;
            self.level = computed;
            Some(previous)
        } else {
            None
        }
    }

    /// Rejects stats above the ceiling
    pub fn validate(&self) -> Result<(), RaceError> {
        for stat in Stat::ALL {
            let value = self.stats.get(stat);
            if value > MAX_STAT {
                return Err(RaceError::StatOutOfRange {
                    name: self.name.clone(),
                    stat,
                    value,
                    max: MAX_STAT,
                });
            }
        }
        Ok(())
    }
}

/// Builds race rosters
pub struct Roster;

impl Roster {
    /// Player in the first slot followed by stock rivals, `runner_count` in total
    pub fn with_rivals(player: Competitor, runner_count: usize) -> Vec<Competitor> {
        let mut roster = Vec::with_capacity(runner_count.max(1));
        let player_name = player.name.clone();
        roster.push(player);

        let mut names = RIVAL_NAMES
            .iter()
            .skip(1)
            .filter(|name| **name != player_name);

        while roster.len() < runner_count {
            let name = match names.next() {
                Some(name) => name.to_string(),
                None => format!("Rival {}", roster.len() + 1),
            };
            roster.push(Competitor::simulated(name));
        }
        roster
    }

    /// Checks the roster-level invariants before a race starts
    pub fn validate(roster: &[Competitor]) -> Result<(), RaceError> {
        if roster.is_empty() {
            return Err(RaceError::EmptyRoster);
        }
        match roster.iter().filter(|c| c.controlled).count() {
            1 => {}
            0 => return Err(RaceError::NoControlled),
            count => return Err(RaceError::MultipleControlled { count }),
        }
        roster.iter().try_for_each(Competitor::validate)
    }
}

/// Live race state shared between a worker and readers
#[derive(Debug, Default)]
pub struct LiveRunner {
    position: AtomicU32,
    finished: AtomicBool,
}

impl LiveRunner {
    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Only the owning worker calls this
    pub(crate) fn set_position(&self, position: u32) {
        self.position.store(position, Ordering::Release);
    }

    /// Flips the flag false -> true. Returns false if it was already set.
    pub(crate) fn mark_finished(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Compact runner state for the host's render loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub index: usize,
    pub name: String,
    pub controlled: bool,
    pub lane: u32,
    pub position: u32,
    pub finished: bool,
}
