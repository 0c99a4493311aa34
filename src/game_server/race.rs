//! Race - Orchestrates one race across concurrent workers
//!
//! Every competitor gets its own thread. Workers move in lockstep ticks
//! through a shared gate: each one takes its step, reports whether it
//! crossed the line, and waits until every active worker has done the same.
//! The last worker to arrive commits the tick's crossings to the finish
//! ledger, earliest sub-tick crossing first, then releases the others.
//! A supervising thread joins all workers and publishes the outcome.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game_server::config::RaceConfig;
use crate::game_server::error::RaceError;
use crate::game_server::ledger::{FinishEntry, FinishLedger};
use crate::game_server::movement::{
    clamp_displacement, MovementModel, Pace, RunnerView, StatMovement,
};
use crate::game_server::runner::{Competitor, LiveRunner, RaceState, Roster, RunnerSnapshot};

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Running,
    /// Every worker exited on its own
    Completed,
    /// Stopped by a cancel request before everyone finished
    Cancelled,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Line crossing reported by a worker for the current tick
#[derive(Debug, Clone, Copy)]
struct Crossing {
    index: usize,
    /// Distance left before the final step
    shortfall: u32,
    step: u32,
    tiebreak: u64,
}

impl Crossing {
    /// Earlier crossing within the tick sorts first
    fn cmp_within_tick(&self, other: &Self) -> CmpOrdering {
        let lhs = u64::from(self.shortfall) * u64::from(other.step);
        let rhs = u64::from(other.shortfall) * u64::from(self.step);
        lhs.cmp(&rhs)
            .then(self.tiebreak.cmp(&other.tiebreak))
            .then(self.index.cmp(&other.index))
    }
}

#[derive(Debug)]
struct GateState {
    /// Ticks committed so far
    tick: u64,
    arrived: usize,
    active: usize,
    crossings: Vec<Crossing>,
}

struct Entrant {
    name: String,
    controlled: bool,
    lane: u32,
    live: LiveRunner,
}

struct RaceShared {
    config: RaceConfig,
    entrants: Vec<Entrant>,
    ledger: FinishLedger,
    cancel: CancelToken,
    status: Mutex<RaceStatus>,
    gate: Mutex<GateState>,
    advanced: Condvar,
}

impl RaceShared {
    fn arrive(&self, crossing: Option<Crossing>) {
        let mut gate = self.gate.lock();
        let tick = gate.tick;
        gate.crossings.extend(crossing);
        gate.arrived += 1;
        if gate.arrived >= gate.active {
            self.commit(&mut gate);
        } else {
            while gate.tick == tick {
                self.advanced.wait(&mut gate);
            }
        }
    }

    fn leave(&self) {
        let mut gate = self.gate.lock();
        gate.active = gate.active.saturating_sub(1);
        if gate.active > 0 && gate.arrived >= gate.active {
            self.commit(&mut gate);
        }
    }

    fn commit(&self, gate: &mut GateState) {
        let tick = gate.tick + 1;
        let mut crossings = std::mem::take(&mut gate.crossings);
        crossings.sort_by(Crossing::cmp_within_tick);

        for crossing in &crossings {
            let entrant = &self.entrants[crossing.index];
            self.ledger.append(FinishEntry {
                index: crossing.index,
                name: entrant.name.clone(),
                controlled: entrant.controlled,
                placement: 0,
                finish_tick: tick,
                finish_time_ms: tick * self.config.tick_interval_ms,
            });
        }

        gate.active = gate.active.saturating_sub(crossings.len());
        gate.arrived = 0;
        gate.tick = tick;
        self.advanced.notify_all();
    }

    fn snapshot(&self) -> RaceSnapshot {
        let tick = self.gate.lock().tick;
        RaceSnapshot {
            status: *self.status.lock(),
            tick,
            elapsed_ms: tick * self.config.tick_interval_ms,
            runners: self
                .entrants
                .iter()
                .enumerate()
                .map(|(index, entrant)| RunnerSnapshot {
                    index,
                    name: entrant.name.clone(),
                    controlled: entrant.controlled,
                    lane: entrant.lane,
                    position: entrant.live.position(),
                    finished: entrant.live.is_finished(),
                })
                .collect(),
            finisher_count: self.ledger.len() as u32,
        }
    }
}

/// A worker's place at the tick gate. Dropping an occupied seat leaves the
/// gate so the other workers are never left waiting, even on panic.
struct GateSeat<'a> {
    shared: &'a RaceShared,
    seated: bool,
}

impl<'a> GateSeat<'a> {
    fn new(shared: &'a RaceShared) -> Self {
        Self { shared, seated: true }
    }

    fn arrive(&mut self) {
        self.shared.arrive(None);
    }

    /// Reports the crossing; the commit releases the seat
    fn finish(mut self, crossing: Crossing) {
        self.seated = false;
        self.shared.arrive(Some(crossing));
    }
}

impl Drop for GateSeat<'_> {
    fn drop(&mut self) {
        if self.seated {
            self.shared.leave();
        }
    }
}

fn run_worker(
    shared: Arc<RaceShared>,
    index: usize,
    pace: Pace,
    mut rng: StdRng,
    model: Arc<dyn MovementModel>,
) {
    let mut seat = GateSeat::new(&shared);
    let entrant = &shared.entrants[index];
    let track_length = shared.config.track_length;
    let interval = shared.config.tick_interval();
    let mut tick = 0;

    loop {
        if shared.cancel.is_cancelled() {
            log::debug!("{} stopped at {}", entrant.name, entrant.live.position());
            return;
        }

        let position = entrant.live.position();
        let view = RunnerView { pace, position, tick };
        let step = clamp_displacement(position, model.advance(&view, track_length, &mut rng), track_length);
        let next = position + step;
        entrant.live.set_position(next);
        tick += 1;

        if next >= track_length && entrant.live.mark_finished() {
            seat.finish(Crossing {
                index,
                shortfall: track_length - position,
                step,
                tiebreak: rng.gen(),
            });
            return;
        }

        seat.arrive();
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
}

/// Compact race snapshot for the host's render loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub tick: u64,
    pub elapsed_ms: u64,
    pub runners: Vec<RunnerSnapshot>,
    pub finisher_count: u32,
}

/// Everything a finished (or cancelled) race produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub status: RaceStatus,
    pub track_length: u32,
    pub ticks: u64,
    pub finish_order: Vec<FinishEntry>,
    /// Final race state per roster index
    pub final_states: Vec<RaceState>,
}

impl RaceOutcome {
    /// 0-based place of the controlled competitor, if it finished
    pub fn controlled_placement(&self) -> Option<usize> {
        self.finish_order.iter().position(|e| e.controlled)
    }

    pub fn winner(&self) -> Option<&FinishEntry> {
        self.finish_order.first()
    }

    /// Copies final race state back into the roster the race was started with
    pub fn apply_to(&self, roster: &mut [Competitor]) {
        for (competitor, state) in roster.iter_mut().zip(&self.final_states) {
            competitor.race = *state;
        }
    }
}

/// A race in progress
pub struct RunningRace {
    shared: Arc<RaceShared>,
    supervisor: JoinHandle<Result<RaceOutcome, RaceError>>,
}

impl RunningRace {
    /// Validates the setup and launches one worker per competitor
    pub fn start(
        roster: &[Competitor],
        config: &RaceConfig,
        model: Arc<dyn MovementModel>,
        rng: &mut dyn RngCore,
    ) -> Result<Self, RaceError> {
        if config.track_length == 0 {
            log::warn!("Rejected race: track length is zero");
            return Err(RaceError::InvalidTrackLength);
        }
        if let Err(err) = Roster::validate(roster) {
            log::warn!("Rejected race: {err}");
            return Err(err);
        }

        let mut lanes: Vec<u32> = (0..roster.len() as u32).collect();
        lanes.shuffle(rng);

        let mut plans = Vec::with_capacity(roster.len());
        for competitor in roster {
            let pace = model.pace(competitor, rng);
            let worker_rng = StdRng::seed_from_u64(rng.gen());
            plans.push((pace, worker_rng));
        }

        let entrants = roster
            .iter()
            .zip(&lanes)
            .map(|(competitor, &lane)| Entrant {
                name: competitor.name.clone(),
                controlled: competitor.controlled,
                lane,
                live: LiveRunner::default(),
            })
            .collect();

        let shared = Arc::new(RaceShared {
            config: config.clone(),
            entrants,
            ledger: FinishLedger::new(),
            cancel: CancelToken::new(),
            status: Mutex::new(RaceStatus::Running),
            gate: Mutex::new(GateState {
                tick: 0,
                arrived: 0,
                active: roster.len(),
                crossings: Vec::with_capacity(roster.len()),
            }),
            advanced: Condvar::new(),
        });

        let workers: Vec<_> = plans
            .into_iter()
            .enumerate()
            .map(|(index, (pace, worker_rng))| {
                let shared = Arc::clone(&shared);
                let model = Arc::clone(&model);
                thread::spawn(move || run_worker(shared, index, pace, worker_rng, model))
            })
            .collect();

        log::info!(
            "Race started: {} runners over {} units",
            roster.len(),
            config.track_length
        );

        let supervised = Arc::clone(&shared);
        let supervisor = thread::spawn(move || supervise(supervised, workers));

        Ok(Self { shared, supervisor })
    }

    /// Live positions, safe to poll at any cadence
    pub fn snapshot(&self) -> RaceSnapshot {
        self.shared.snapshot()
    }

    /// Finish order so far
    pub fn finish_order(&self) -> Vec<FinishEntry> {
        self.shared.ledger.entries()
    }

    pub fn status(&self) -> RaceStatus {
        *self.shared.status.lock()
    }

    /// Asks every worker to stop at its next tick
    pub fn cancel(&self) {
        log::info!("Race cancellation requested");
        self.shared.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// True once every worker has exited
    pub fn is_done(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Blocks until every worker has exited
    pub fn join(self) -> Result<RaceOutcome, RaceError> {
        self.supervisor.join().map_err(|_| RaceError::WorkerPanicked {
            name: "supervisor".to_string(),
        })?
    }
}

fn supervise(shared: Arc<RaceShared>, workers: Vec<JoinHandle<()>>) -> Result<RaceOutcome, RaceError> {
    let mut panicked = None;
    for (index, worker) in workers.into_iter().enumerate() {
        if worker.join().is_err() && panicked.is_none() {
            panicked = Some(index);
        }
    }

    let finish_order = shared.ledger.entries();
    let status = if finish_order.len() < shared.entrants.len() && shared.cancel.is_cancelled() {
        RaceStatus::Cancelled
    } else {
        RaceStatus::Completed
    };
    *shared.status.lock() = status;

    if let Some(index) = panicked {
        let name = shared.entrants[index].name.clone();
        log::warn!("Race worker for {name} panicked");
        return Err(RaceError::WorkerPanicked { name });
    }

    let ticks = shared.gate.lock().tick;
    match finish_order.first() {
        Some(winner) => log::info!(
            "Race {:?} after {} ticks, {} of {} finished, winner {}",
            status,
            ticks,
            finish_order.len(),
            shared.entrants.len(),
            winner.name
        ),
        None => log::info!("Race {:?} after {} ticks with no finishers", status, ticks),
    }

    Ok(RaceOutcome {
        status,
        track_length: shared.config.track_length,
        ticks,
        final_states: shared
            .entrants
            .iter()
            .map(|entrant| RaceState {
                position: entrant.live.position(),
                finished: entrant.live.is_finished(),
                lane: entrant.lane,
            })
            .collect(),
        finish_order,
    })
}

/// Runs a race to completion with the stock movement model and writes the
/// final race state back into `roster`.
pub fn run_race(
    roster: &mut [Competitor],
    config: &RaceConfig,
    rng: &mut dyn RngCore,
) -> Result<RaceOutcome, RaceError> {
    run_race_with(roster, config, Arc::new(StatMovement::default()), rng)
}

/// `run_race` with a caller-supplied movement model
pub fn run_race_with(
    roster: &mut [Competitor],
    config: &RaceConfig,
    model: Arc<dyn MovementModel>,
    rng: &mut dyn RngCore,
) -> Result<RaceOutcome, RaceError> {
    for competitor in roster.iter_mut() {
        competitor.race = RaceState::default();
    }
    let outcome = RunningRace::start(roster, config, model, rng)?.join()?;
    outcome.apply_to(roster);
    Ok(outcome)
}
