//! Finish-order integrity under concurrent workers.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use derby_lib::{
    clamp_displacement, run_race, run_race_with, Competitor, MovementModel, Pace, RaceConfig,
    RaceStatus, Roster, RunnerView, RunningRace, StatMovement, Stats,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Every runner covers the whole track in one step
struct Teleport;

impl MovementModel for Teleport {
    fn pace(&self, _competitor: &Competitor, _rng: &mut dyn RngCore) -> Pace {
        Pace::Baseline { velocity: u32::MAX }
    }

    fn advance(&self, runner: &RunnerView, track_length: u32, _rng: &mut dyn RngCore) -> u32 {
        clamp_displacement(runner.position, u32::MAX, track_length)
    }
}

fn config(track_length: u32, tick_interval_ms: u64) -> RaceConfig {
    RaceConfig {
        track_length,
        tick_interval_ms,
        ..Default::default()
    }
}

#[test]
fn simultaneous_finishers_are_each_recorded_once() {
    for seed in 0..200 {
        let mut roster = Roster::with_rivals(Competitor::controlled("Cuki"), 5);
        let mut rng = StdRng::seed_from_u64(seed);
        let outcome =
            run_race_with(&mut roster, &config(1_000, 0), Arc::new(Teleport), &mut rng).unwrap();

        assert_eq!(outcome.status, RaceStatus::Completed);
        assert_eq!(outcome.finish_order.len(), 5);
        let unique: HashSet<_> = outcome.finish_order.iter().map(|e| e.index).collect();
        assert_eq!(unique.len(), 5, "seed {seed}: {:?}", outcome.finish_order);
        assert!(outcome.finish_order.iter().all(|e| e.finish_tick == 1));
        assert!(roster.iter().all(|c| c.race.finished && c.race.position == 1_000));
    }
}

#[test]
fn finish_order_is_reproducible_for_a_seed() {
    for seed in [1, 99, 31337] {
        let run = || {
            let mut roster = Roster::with_rivals(
                Competitor::controlled("Cuki").with_stats(Stats::new(90, 70, 60)),
                5,
            );
            let mut rng = StdRng::seed_from_u64(seed);
            run_race(&mut roster, &config(800, 0), &mut rng).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.finish_order, second.finish_order);
        assert_eq!(first.final_states, second.final_states);
    }
}

#[test]
fn teleporting_ties_are_even() {
    let mut wins = [0u32; 5];
    for seed in 0..500 {
        let mut roster = Roster::with_rivals(Competitor::controlled("Cuki"), 5);
        let mut rng = StdRng::seed_from_u64(seed);
        let outcome =
            run_race_with(&mut roster, &config(10, 0), Arc::new(Teleport), &mut rng).unwrap();
        wins[outcome.finish_order[0].index] += 1;
    }
    // 100 expected per runner
    assert!(wins.iter().all(|&w| (50..=150).contains(&w)), "{wins:?}");
}

#[test]
fn stronger_player_wins_more_often() {
    let win_rate = |stats: Stats| {
        let mut wins = 0;
        for seed in 0..60 {
            let mut roster =
                Roster::with_rivals(Competitor::controlled("Cuki").with_stats(stats), 5);
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = run_race(&mut roster, &config(400, 0), &mut rng).unwrap();
            if outcome.controlled_placement() == Some(0) {
                wins += 1;
            }
        }
        wins
    };
    let rookie = win_rate(Stats::default());
    let champion = win_rate(Stats::new(200, 200, 200));
    assert!(champion > rookie, "champion {champion}, rookie {rookie}");
}

#[test]
fn live_positions_never_move_backwards() {
    let roster = Roster::with_rivals(Competitor::controlled("Cuki"), 5);
    let mut rng = StdRng::seed_from_u64(12);
    let race = RunningRace::start(
        &roster,
        &config(300, 1),
        Arc::new(StatMovement::default()),
        &mut rng,
    )
    .unwrap();

    let mut last = vec![0; roster.len()];
    while !race.is_done() {
        let snapshot = race.snapshot();
        for runner in &snapshot.runners {
            assert!(runner.position >= last[runner.index]);
            assert!(runner.position <= 300);
            last[runner.index] = runner.position;
        }
        let order = race.finish_order();
        assert!(order.len() <= roster.len());
        thread::sleep(Duration::from_millis(1));
    }

    let outcome = race.join().unwrap();
    assert_eq!(outcome.finish_order.len(), 5);
}

#[test]
fn cancellation_mid_race_keeps_recorded_finishers() {
    let roster = Roster::with_rivals(Competitor::controlled("Cuki"), 5);
    let mut rng = StdRng::seed_from_u64(21);
    let race = RunningRace::start(
        &roster,
        &config(200, 1),
        Arc::new(StatMovement::default()),
        &mut rng,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(5));
    race.cancel();
    let outcome = race.join().unwrap();

    assert!(outcome.finish_order.len() <= 5);
    for (index, state) in outcome.final_states.iter().enumerate() {
        let recorded = outcome.finish_order.iter().any(|e| e.index == index);
        assert_eq!(state.finished, recorded);
        assert_eq!(state.finished, state.position == 200);
    }
    if outcome.finish_order.len() < 5 {
        assert_eq!(outcome.status, RaceStatus::Cancelled);
    }
}
