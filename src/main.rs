//! Headless race host
//!
//! Runs races from the terminal and prints the finish order, standing in
//! for a graphical front end.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use derby_lib::{Competitor, GameConfig, RaceServer, Stat, Stats};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "derby")]
#[command(about = "Run a horse race against simulated rivals")]
#[command(version = "0.1.0")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the player's horse
    #[arg(short, long, default_value = "Cuki")]
    name: String,

    /// Player stats as speed,stamina,acceleration
    #[arg(long, value_delimiter = ',', default_values_t = [50, 50, 50])]
    stats: Vec<u32>,

    /// Starting coin balance
    #[arg(long, default_value = "0")]
    coins: u32,

    /// Upgrades to buy before the first race
    #[arg(short, long, value_enum)]
    upgrade: Vec<StatArg>,

    /// Number of races to run
    #[arg(short, long, default_value = "1")]
    races: u32,

    #[arg(long)]
    track_length: Option<u32>,

    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seed for reproducible races
    #[arg(long)]
    seed: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatArg {
    Speed,
    Stamina,
    Acceleration,
}

impl From<StatArg> for Stat {
    fn from(arg: StatArg) -> Self {
        match arg {
            StatArg::Speed => Stat::Speed,
            StatArg::Stamina => Stat::Stamina,
            StatArg::Acceleration => Stat::Acceleration,
        }
    }
}

fn ordinal(place: u32) -> String {
    let suffix = match (place % 10, place % 100) {
        (1, n) if n != 11 => "st",
        (2, n) if n != 12 => "nd",
        (3, n) if n != 13 => "rd",
        _ => "th",
    };
    format!("{place}{suffix}")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GameConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(track_length) = cli.track_length {
        config.race.track_length = track_length;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.race.tick_interval_ms = tick_ms;
    }
    config.validate()?;
    ensure!(
        cli.stats.len() == 3,
        "--stats takes speed,stamina,acceleration, got {} values",
        cli.stats.len()
    );

    let refresh = config.race.tick_interval().max(Duration::from_millis(10)) * 5;
    let player = Competitor::controlled(&cli.name)
        .with_stats(Stats::new(cli.stats[0], cli.stats[1], cli.stats[2]))
        .with_coins(cli.coins);
    let mut server = RaceServer::new(config, player, cli.seed);

    for stat in cli.upgrade.iter().copied().map(Stat::from) {
        match server.purchase_upgrade(stat) {
            Ok(receipt) => println!(
                "Upgraded {stat}: {} -> {} for {} coins",
                receipt.old_value, receipt.new_value, receipt.cost
            ),
            Err(err) => println!("Upgrade failed: {err}"),
        }
    }

    for _ in 0..cli.races {
        server.init_race()?;
        server.start_race()?;

        let settlement = loop {
            if let Some(settlement) = server.poll()? {
                break settlement;
            }
            if let Some(snapshot) = server.snapshot() {
                log::debug!(
                    "tick {}: {:?}",
                    snapshot.tick,
                    snapshot.runners.iter().map(|r| r.position).collect::<Vec<_>>()
                );
            }
            thread::sleep(refresh);
        };

        let results = server.results().unwrap_or_default();
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            continue;
        }

        println!("FINISH");
        for entry in results {
            let marker = if entry.controlled { " (you)" } else { "" };
            println!(
                "  {:>4}  {}{}  {:.2}s",
                ordinal(entry.placement),
                entry.name,
                marker,
                entry.finish_time_ms as f64 / 1000.0
            );
        }
        match settlement.record.as_ref().and_then(|r| r.placement) {
            Some(place) => println!(
                "You finished {}! Coins earned: {}",
                ordinal(place),
                settlement.coins_earned
            ),
            None => println!("No placement this race."),
        }
    }

    let player = server.player();
    println!(
        "{}: level {}, {} coins, speed {} stamina {} acceleration {}",
        player.name,
        player.level,
        player.coins,
        player.stats.speed,
        player.stats.stamina,
        player.stats.acceleration
    );
    Ok(())
}
