//! Headless simulation runner.
//!
//! Runs the economy simulation without graphics, for CI and determinism
//! verification.
//!
//! # Usage
//!
//! ```bash
//! # Run the demo economy for 600 ticks and print a JSON summary
//! cargo run -p gridfront_headless -- run --ticks 600
//!
//! # Replay the same scenario several times and compare state hashes
//! cargo run -p gridfront_headless -- verify --runs 5
//! ```
//!
//! Output (stdout): one JSON document
//! Logs (stderr): progress and warnings

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridfront_core::prelude::*;
use gridfront_core::task::{CollectAndDropTask, SpawnTask};

// The prelude's one-parameter `Result` shadows `std::result::Result`, so
// the CLI entry points spell out their own alias.
type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "gridfront_headless")]
#[command(about = "Headless economy simulation runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo economy and print a JSON summary
    Run {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Map edge length in cells
        #[arg(long, default_value = "32", value_parser = clap::value_parser!(u32).range(32..=1024))]
        map_size: u32,

        /// Simulation rate in ticks per second
        #[arg(long, default_value = "10")]
        tick_rate: u32,

        /// Log a progress line every N ticks (0 = never)
        #[arg(long, default_value = "100")]
        interval: u64,
    },

    /// Replay the demo economy and check that every run hashes the same
    Verify {
        /// Number of ticks to simulate per run
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },
}

#[derive(Serialize)]
struct StockpileSummary {
    food: u32,
    gold: u32,
    wood: u32,
}

#[derive(Serialize)]
struct PlayerSummary {
    name: String,
    population: u32,
    population_cap: u32,
    stockpile: StockpileSummary,
}

#[derive(Serialize)]
struct RunSummary {
    ticks: u64,
    tick_rate: u32,
    map_size: u32,
    state_hash: u64,
    objects: usize,
    commands_in_flight: usize,
    players: Vec<PlayerSummary>,
}

#[derive(Serialize)]
struct VerifySummary {
    ticks: u64,
    runs: u32,
    state_hash: u64,
    deterministic: bool,
    restore_in_lockstep: bool,
}

fn main() -> CliResult {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries the JSON summary.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            ticks,
            map_size,
            tick_rate,
            interval,
        }) => cmd_run(ticks, map_size, tick_rate, interval),
        Some(Commands::Verify { ticks, runs }) => cmd_verify(ticks, runs),
        None => cmd_run(600, 32, 10, 100),
    }
}

/// Set up the demo economy: one player, a town center and a camp, three
/// resource nodes, two villagers on harvest loops, and a villager in
/// training at the town center.
fn build_scenario(map_size: u32, tick_rate: u32) -> Result<Simulation> {
    let mut sim = Simulation::new(map_size, tick_rate);
    let player = sim.add_player("red", Stockpile::new(200, 100, 150));

    let town_center =
        sim.spawn_building(BuildingKind::TownCenter, player, Coordinate::new(1, 1))?;
    sim.spawn_building(BuildingKind::Camp, player, Coordinate::new(1, 8))?;

    let wood = Coordinate::new(20, 20);
    let gold = Coordinate::new(26, 6);
    sim.spawn_resource(ResourceKind::Wood, wood)?;
    sim.spawn_resource(ResourceKind::Gold, gold)?;
    sim.spawn_resource(ResourceKind::Food, Coordinate::new(8, 26))?;

    let lumberjack = sim.spawn_unit(UnitKind::Villager, player, Coordinate::new(6, 6))?;
    let miner = sim.spawn_unit(UnitKind::Villager, player, Coordinate::new(7, 7))?;

    let haul_wood = CollectAndDropTask::new(&sim, lumberjack, wood, Coordinate::new(1, 8))?;
    sim.assign_task(lumberjack, Task::CollectAndDrop(haul_wood))?;
    let haul_gold = CollectAndDropTask::new(&sim, miner, gold, Coordinate::new(1, 1))?;
    sim.assign_task(miner, Task::CollectAndDrop(haul_gold))?;

    let training = SpawnTask::new(&sim, town_center, UnitKind::Villager)?;
    sim.assign_task(town_center, Task::Spawn(training))?;

    Ok(sim)
}

fn advance(sim: &mut Simulation, ticks: u64, interval: u64) -> Result<()> {
    for _ in 0..ticks {
        let events = sim.tick()?;
        for (actor, process, err) in &events.failed {
            tracing::warn!(%actor, ?process, %err, "command failed");
        }
        for (entity, err) in &events.tasks_failed {
            tracing::warn!(%entity, %err, "task aborted");
        }
        if interval > 0 && sim.tick_count() % interval == 0 {
            log_progress(sim);
        }
    }
    Ok(())
}

fn log_progress(sim: &Simulation) {
    for player in sim.players() {
        tracing::info!(
            tick = sim.tick_count(),
            player = %player.id,
            food = player.stockpile.amount(ResourceKind::Food),
            gold = player.stockpile.amount(ResourceKind::Gold),
            wood = player.stockpile.amount(ResourceKind::Wood),
            population = player.population(),
            "progress"
        );
    }
}

fn cmd_run(ticks: u64, map_size: u32, tick_rate: u32, interval: u64) -> CliResult {
    tracing::info!(ticks, map_size, tick_rate, "starting demo economy");

    let mut sim = build_scenario(map_size, tick_rate)?;
    advance(&mut sim, ticks, interval)?;

    let summary = RunSummary {
        ticks: sim.tick_count(),
        tick_rate,
        map_size,
        state_hash: sim.state_hash(),
        objects: sim.objects().len(),
        commands_in_flight: sim.commands().len(),
        players: sim
            .players()
            .iter()
            .map(|player| PlayerSummary {
                name: player.name.clone(),
                population: player.population(),
                population_cap: player.population_cap,
                stockpile: StockpileSummary {
                    food: player.stockpile.amount(ResourceKind::Food),
                    gold: player.stockpile.amount(ResourceKind::Gold),
                    wood: player.stockpile.amount(ResourceKind::Wood),
                },
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_verify(ticks: u64, runs: u32) -> CliResult {
    tracing::info!(ticks, runs, "verifying determinism");

    let mut hashes = Vec::new();
    for run in 0..runs.max(1) {
        let mut sim = build_scenario(32, 10)?;
        advance(&mut sim, ticks, 0)?;
        let hash = sim.state_hash();
        tracing::info!(run, hash, "run finished");
        hashes.push(hash);
    }
    let deterministic = hashes.windows(2).all(|pair| pair[0] == pair[1]);

    // Snapshot halfway through a run, restore, and check the restored
    // simulation stays in lockstep to the end.
    let mut original = build_scenario(32, 10)?;
    advance(&mut original, ticks / 2, 0)?;
    let snapshot = original.serialize()?;
    let mut restored = Simulation::deserialize(&snapshot)?;
    advance(&mut original, ticks - ticks / 2, 0)?;
    advance(&mut restored, ticks - ticks / 2, 0)?;
    let restore_in_lockstep = original.state_hash() == restored.state_hash();

    let summary = VerifySummary {
        ticks,
        runs,
        state_hash: hashes.first().copied().unwrap_or_default(),
        deterministic,
        restore_in_lockstep,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !deterministic || !restore_in_lockstep {
        tracing::error!("determinism check failed");
        std::process::exit(1);
    }
    Ok(())
}
