use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use outbreak::{
    config::Config,
    engine::{CommandRejection, Engine, EngineBuilder, EngineSettings},
    logging,
    modifiers::Difficulty,
    scenario::{RegionDataset, ScenarioLoader},
    snapshot::{RunManifest, SnapshotWriter},
    web::{self, WebServerConfig},
    world::RegionId,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Regional outbreak simulation")]
struct Cli {
    /// Path to the run configuration YAML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Region dataset YAML file (uses the built-in eight-country map when omitted)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play a run to the end without a renderer
    Run {
        /// Region hosting patient zero
        #[arg(long, default_value = "CN")]
        region: String,

        /// EASY, MEDIUM or HARD
        #[arg(long, default_value = "MEDIUM")]
        difficulty: String,

        /// Stop after this many days even if the run is undecided
        #[arg(long, default_value_t = 3_650)]
        max_days: u64,

        /// Policies to enact, in order, as soon as they are affordable
        #[arg(long = "policy")]
        policies: Vec<String>,

        /// Directory for snapshots
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Override snapshot interval in ticks (0 disables export)
        #[arg(long)]
        snapshot_interval: Option<u64>,
    },
    /// Serve the live simulation over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_yaml(path)?,
        None => Config::default(),
    };
    if let Some(seed) = cli.seed {
        config.random_seed = seed;
    }
    logging::init(&config.logging);

    let dataset = match &cli.dataset {
        Some(path) => ScenarioLoader::new(".").load(path)?,
        None => RegionDataset::world_sample(),
    };

    match cli.command {
        Mode::Run {
            region,
            difficulty,
            max_days,
            policies,
            snapshot_dir,
            snapshot_interval,
        } => {
            if let Some(dir) = snapshot_dir {
                config.snapshot.output_dir = dir.to_string_lossy().into_owned();
            }
            if let Some(every) = snapshot_interval {
                config.snapshot.every_ticks = every;
            }
            let difficulty: Difficulty = difficulty.parse()?;
            run_headless(
                &config,
                dataset,
                RegionId::new(region),
                difficulty,
                max_days,
                policies,
            )
        }
        Mode::Serve { host, port } => {
            let builder = EngineBuilder::new(EngineSettings::from_config(&config), dataset);
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(web::run(WebServerConfig {
                builder,
                tick_interval: config.scheduler.tick_interval(),
                host,
                port,
            }))
        }
    }
}

fn run_headless(
    config: &Config,
    dataset: RegionDataset,
    region: RegionId,
    difficulty: Difficulty,
    max_days: u64,
    policies: Vec<String>,
) -> Result<()> {
    let mut engine = Engine::new(EngineSettings::from_config(config), dataset);
    engine.start_infection(&region, difficulty)?;

    let writer = SnapshotWriter::from_config(&config.snapshot);
    let manifest = RunManifest {
        run: config.name.clone(),
        seed: config.random_seed,
        region,
        difficulty,
        started_at: Utc::now(),
    };
    if let Some(path) = writer.write_manifest(&manifest)? {
        info!(path = %path.display(), "snapshot.manifest");
    }

    let mut queue: VecDeque<String> = policies.into();
    while engine.world().stats().day < max_days {
        buy_affordable(&mut engine, &mut queue);
        if engine.tick().is_none() {
            break;
        }
        writer.maybe_write(&engine.snapshot())?;
        if engine.status().is_terminal() {
            break;
        }
    }

    let stats = engine.world().stats();
    match engine.ending() {
        Some(report) => println!(
            "Run '{}' ended in {:?} after {} days: {} survivors, {} casualties, {} still infected",
            config.name,
            report.outcome,
            report.days,
            report.survivors,
            report.casualties,
            report.infected
        ),
        None => println!(
            "Run '{}' undecided after {} days: {} infected, {} dead, {} points",
            config.name, stats.day, stats.total_infected, stats.total_dead, stats.points
        ),
    }
    Ok(())
}

/// Enacts queued policies front to back until one is not yet affordable.
fn buy_affordable(engine: &mut Engine, queue: &mut VecDeque<String>) {
    while let Some(policy) = queue.front() {
        match engine.purchase_policy(policy) {
            Ok(()) => {}
            Err(CommandRejection::InsufficientFunds { .. }) => return,
            Err(rejection) => warn!(%policy, %rejection, "autopilot.skipped"),
        }
        queue.pop_front();
    }
}
