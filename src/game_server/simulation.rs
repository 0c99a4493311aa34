//! Simulation - Race server session
//!
//! Owns the player's competitor between races and drives the race
//! lifecycle for a hosting application: init, start, poll, settle, upgrade.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game_server::config::GameConfig;
use crate::game_server::economy::{Economy, RaceRecord, Settlement, UpgradeReceipt};
use crate::game_server::error::{RaceError, UpgradeError};
use crate::game_server::ledger::FinishEntry;
use crate::game_server::movement::{MovementModel, StatMovement};
use crate::game_server::race::{RaceOutcome, RaceSnapshot, RunningRace};
use crate::game_server::runner::{Competitor, Roster, Stat};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Idle,
    Ready,
    Racing,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_interval_ms: u64,
    pub runner_count: u32,
    pub races_run: u32,
    pub game_state: GameState,
}

/// Race session for one player
pub struct RaceServer {
    state: GameState,
    config: GameConfig,
    economy: Economy,
    model: Arc<dyn MovementModel>,
    rng: StdRng,
    player: Competitor,
    roster: Vec<Competitor>,
    race: Option<RunningRace>,
    outcome: Option<RaceOutcome>,
    history: Vec<RaceRecord>,
}

impl RaceServer {
    /// New session; `seed` makes every race of the session reproducible
    pub fn new(config: GameConfig, player: Competitor, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: GameState::Idle,
            economy: Economy::new(config.economy.clone()),
            config,
            model: Arc::new(StatMovement::default()),
            rng,
            player: Competitor { controlled: true, ..player },
            roster: Vec::new(),
            race: None,
            outcome: None,
            history: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn MovementModel>) -> Self {
        self.model = model;
        self
    }

    /// Lines up the player against fresh rivals
    pub fn init_race(&mut self) -> Result<(), RaceError> {
        if self.race.is_some() {
            return Err(RaceError::AlreadyRunning);
        }
        self.config.race.validate()?;

        let mut roster =
            Roster::with_rivals(self.player.clone(), self.config.race.runner_count as usize);
        for competitor in &mut roster {
            competitor.race = Default::default();
        }
        Roster::validate(&roster)?;

        log::info!("Race initialized with {} runners", roster.len());
        self.roster = roster;
        self.outcome = None;
        self.state = GameState::Ready;
        Ok(())
    }

    /// Starts the prepared race without blocking
    pub fn start_race(&mut self) -> Result<(), RaceError> {
        match self.state {
            GameState::Racing => return Err(RaceError::AlreadyRunning),
            GameState::Ready => {}
            GameState::Idle | GameState::Results => return Err(RaceError::NoActiveRace),
        }
        let race = RunningRace::start(
            &self.roster,
            &self.config.race,
            Arc::clone(&self.model),
            &mut self.rng,
        )?;
        self.race = Some(race);
        self.state = GameState::Racing;
        Ok(())
    }

    /// Live race view
    pub fn snapshot(&self) -> Option<RaceSnapshot> {
        self.race.as_ref().map(RunningRace::snapshot)
    }

    /// Settles the race if it is over. Returns `None` while it still runs.
    pub fn poll(&mut self) -> Result<Option<Settlement>, RaceError> {
        if self.race.as_ref().is_some_and(RunningRace::is_done) {
            self.finish_race().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Waits for the running race, pays out and records history
    pub fn finish_race(&mut self) -> Result<Settlement, RaceError> {
        let race = self.race.take().ok_or(RaceError::NoActiveRace)?;
        let outcome = race.join();
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state = GameState::Idle;
                return Err(err);
            }
        };

        outcome.apply_to(&mut self.roster);
        let mut settlement = self.economy.settle(&mut self.roster, &outcome);
        // Only race results flow back; purchases already live on `self.player`
        if let Some(raced) = self.roster.iter().find(|c| c.controlled) {
            self.player.race = raced.race;
        }
        self.player.coins = self.player.coins.saturating_add(settlement.coins_earned);
        if let Some(record) = settlement.record.as_mut() {
            record.race_number = self.history.len() as u32 + 1;
            self.history.push(record.clone());
        }

        self.outcome = Some(outcome);
        self.state = GameState::Results;
        Ok(settlement)
    }

    /// Requests cancellation; settle with `finish_race`
    pub fn cancel_race(&self) -> Result<(), RaceError> {
        let race = self.race.as_ref().ok_or(RaceError::NoActiveRace)?;
        race.cancel();
        Ok(())
    }

    /// Finish order of the last settled race
    pub fn results(&self) -> Option<&[FinishEntry]> {
        self.outcome.as_ref().map(|o| o.finish_order.as_slice())
    }

    pub fn outcome(&self) -> Option<&RaceOutcome> {
        self.outcome.as_ref()
    }

    pub fn quote(&self, stat: Stat) -> Option<u32> {
        self.economy.quote(&self.player, stat)
    }

    /// Buys an upgrade for the player. Refused mid-race; a race that is
    /// lined up but not started picks the new stats up.
    pub fn purchase_upgrade(&mut self, stat: Stat) -> Result<UpgradeReceipt, UpgradeError> {
        if self.race.is_some() {
            log::warn!("Rejected {stat} upgrade: race in progress");
            return Err(UpgradeError::RaceInProgress { stat });
        }
        let receipt = self.economy.purchase_upgrade(&mut self.player, stat)?;
        if let Some(entry) = self.roster.iter_mut().find(|c| c.controlled) {
            entry.stats = self.player.stats;
            entry.level = self.player.level;
            entry.coins = self.player.coins;
        }
        Ok(receipt)
    }

    pub fn player(&self) -> &Competitor {
        &self.player
    }

    pub fn roster(&self) -> &[Competitor] {
        &self.roster
    }

    pub fn history(&self) -> &[RaceRecord] {
        &self.history
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick_interval_ms: self.config.race.tick_interval_ms,
            runner_count: self.roster.len() as u32,
            races_run: self.history.len() as u32,
            game_state: self.state,
        }
    }

    /// Abandons any running race and returns to idle
    pub fn reset(&mut self) {
        if let Some(race) = self.race.take() {
            race.cancel();
            if let Err(err) = race.join() {
                log::warn!("Discarded race ended with error: {err}");
            }
        }
        self.roster.clear();
        self.outcome = None;
        self.state = GameState::Idle;
        log::info!("Race reset");
    }
}
