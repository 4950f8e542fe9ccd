mod app;
mod explorer;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxstream_engine::EngineConfig;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::{App, Settings};

#[derive(Parser)]
#[command(name = "voxstream-desktop", about = "Voxstream desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine configuration (JSON). Missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the synthetic explorer feed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Milliseconds between feed snapshots
    #[arg(long, default_value = "100")]
    feed_interval_ms: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;

    tracing::info!("voxstream-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(Settings {
        config,
        seed: cli.seed,
        feed_interval: Duration::from_millis(cli.feed_interval_ms.max(1)),
    });
    event_loop.run_app(&mut app)?;

    Ok(())
}
