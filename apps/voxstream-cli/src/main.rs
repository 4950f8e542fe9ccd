mod feed;
mod scenario;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use voxstream_common::VoxelKey;
use voxstream_engine::{ChangeSet, Engine, EngineConfig};
use voxstream_render::HeadlessBackend;
use voxstream_tools::EngineInspector;

use crate::scenario::Rng;

/// Upper bound on ticks spent draining one snapshot.
const MAX_SETTLE_TICKS: usize = 100_000;

#[derive(Parser)]
#[command(name = "voxstream-cli", about = "Headless driver for the voxstream engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Engine configuration (JSON). Missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the chunk edge length
    #[arg(long)]
    chunk_size: Option<i32>,
    /// Override the culling distance
    #[arg(long)]
    culling_distance: Option<f32>,
    /// Disable distance culling
    #[arg(long)]
    no_culling: bool,
    /// Override the per-frame drain budget in milliseconds
    #[arg(long)]
    frame_budget_ms: Option<u64>,
}

impl EngineArgs {
    fn load(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => EngineConfig::default(),
        };
        if let Some(size) = self.chunk_size {
            config.chunk.chunk_size = size;
        }
        if let Some(distance) = self.culling_distance {
            config.lod.culling_distance = distance;
        }
        if self.no_culling {
            config.lod.culling_enabled = false;
        }
        if let Some(ms) = self.frame_budget_ms {
            config.scheduler.frame_budget_ms = ms;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and the default configuration
    Info,
    /// Stream a synthetic scene through a headless engine
    Simulate {
        #[command(flatten)]
        engine: EngineArgs,
        /// Voxels in the initial snapshot
        #[arg(short = 'n', long, default_value = "5000")]
        voxels: usize,
        /// Half-size of the cube the voxels are scattered in
        #[arg(long, default_value = "40")]
        extent: i32,
        /// Snapshots applied after the initial one
        #[arg(long, default_value = "5")]
        rounds: usize,
        /// Print stats every this many ticks
        #[arg(long, default_value = "10")]
        report_every: usize,
        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Apply a JSON-lines feed, one snapshot per line ("-" for stdin)
    Replay {
        #[command(flatten)]
        engine: EngineArgs,
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("voxstream-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", voxstream_common::crate_info());
            println!("stream: {}", voxstream_stream::crate_info());
            println!("render: {}", voxstream_render::crate_info());
            println!("engine: {}", voxstream_engine::crate_info());
            println!("tools: {}", voxstream_tools::crate_info());
            let defaults = serde_json::to_string_pretty(&EngineConfig::default())?;
            println!("default config:\n{defaults}");
        }
        Commands::Simulate {
            engine,
            voxels,
            extent,
            rounds,
            report_every,
            seed,
        } => {
            let mut engine = Engine::new(engine.load()?, HeadlessBackend::new())?;
            simulate(&mut engine, voxels, extent, rounds, report_every.max(1), seed);
        }
        Commands::Replay { engine, input } => {
            let mut engine = Engine::new(engine.load()?, HeadlessBackend::new())?;
            replay(&mut engine, &input)?;
        }
    }

    Ok(())
}

fn read_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Apply one snapshot and tick until the queue is empty. Returns ticks used.
fn settle(
    engine: &mut Engine<HeadlessBackend>,
    changes: &ChangeSet,
    report_every: usize,
) -> usize {
    engine.apply_changes(changes);
    let mut ticks = 0;
    loop {
        let report = engine.tick(Instant::now());
        ticks += 1;
        if ticks % report_every == 0 {
            println!("  tick {ticks:>5}: {}", engine.stats().summary());
        }
        if report.pending == 0 || ticks >= MAX_SETTLE_TICKS {
            break;
        }
    }
    ticks
}

fn simulate(
    engine: &mut Engine<HeadlessBackend>,
    voxels: usize,
    extent: i32,
    rounds: usize,
    report_every: usize,
    seed: u64,
) {
    let mut rng = Rng::new(seed);
    let mut snapshot = scenario::random_snapshot(&mut rng, voxels, extent);
    println!("Simulate: seed={seed} voxels={} extent={extent}", snapshot.len());

    let started = Instant::now();
    let ticks = settle(engine, &snapshot, report_every);
    println!(
        "Initial snapshot settled in {ticks} ticks ({:.1}ms)",
        started.elapsed().as_secs_f64() * 1000.0
    );
    println!("{}", EngineInspector::summary(engine));

    for round in 1..=rounds {
        let position = VoxelKey::new(round as i32 * 3, 0, 0);
        snapshot = scenario::churn(&snapshot, &mut rng, 10, position);
        let ticks = settle(engine, &snapshot, report_every);
        println!("Round {round}: {ticks} ticks, {}", engine.stats().summary());
    }

    let ticks = settle(engine, &ChangeSet::new(), report_every);
    let stats = engine.stats();
    println!(
        "Cleared in {ticks} ticks: live={} chunks={} acquires={} releases={}",
        stats.live_voxels, stats.chunks, stats.slot_acquires, stats.slot_releases
    );
    println!("{}", EngineInspector::summary(engine));
}

fn replay(engine: &mut Engine<HeadlessBackend>, input: &Path) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("opening feed {}", input.display()))?;
        Box::new(std::io::BufReader::new(file))
    };

    let mut snapshots = 0usize;
    let mut dropped = 0usize;
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("reading feed")?;
        if line.trim().is_empty() {
            continue;
        }
        let decoded = feed::decode_line(&line)
            .with_context(|| format!("feed line {}", number + 1))?;
        dropped += decoded.dropped;
        let ticks = settle(engine, &decoded.changes, usize::MAX);
        snapshots += 1;
        tracing::debug!(line = number + 1, ticks, "snapshot applied");
    }

    println!("Replayed {snapshots} snapshots, dropped {dropped} messages");
    println!("{}", EngineInspector::summary(engine));
    println!("{}", engine.stats().summary());
    Ok(())
}
