//! Historical replay tool
//!
//! Feeds a recorded JSONL report file through the scoring pipeline at an
//! accelerated virtual clock rate and prints the final score report.
//!
//! Usage:
//!   cargo run --bin navscore-replay -- --reports tracks/dev-1.jsonl
//!   cargo run --bin navscore-replay -- --reports tracks/dev-1.jsonl --speed 0

use anyhow::{bail, Context};
use clap::Parser;
use navscore::domain::route::RouteDefinition;
use navscore::infra::{Config, Metrics};
use navscore::services::{replay, ContestantTracker};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "navscore-replay")]
#[command(about = "Replay a recorded track through the scoring pipeline")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// JSONL file of recorded position reports
    #[arg(short, long)]
    reports: String,

    /// Contestant ID to score (defaults to the single configured contestant)
    #[arg(long)]
    contestant: Option<String>,

    /// Virtual clock speed factor; 0 replays as fast as possible
    /// (defaults to the configured replay speed)
    #[arg(long)]
    speed: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    let definition = RouteDefinition::from_file(config.route_file())
        .with_context(|| format!("cannot load route {}", config.route_file()))?;

    let contestant = match &args.contestant {
        Some(id) => config
            .contestants()
            .iter()
            .find(|c| c.id.0 == *id)
            .cloned()
            .with_context(|| format!("contestant {id:?} not found in {}", config.config_file()))?,
        None => match config.contestants() {
            [only] => only.clone(),
            [] => bail!("no contestants configured in {}", config.config_file()),
            _ => bail!("multiple contestants configured; pass --contestant <id>"),
        },
    };

    let reports = replay::load_reports(&args.reports)?;
    if reports.is_empty() {
        bail!("report file {} is empty", args.reports);
    }
    info!(contestant = %contestant.id, reports = %reports.len(), "replay_loaded");

    let mut tracker =
        ContestantTracker::new(contestant, &definition, Arc::new(Metrics::new()), None)?;

    let speed = args.speed.unwrap_or_else(|| config.replay_speed_factor());
    replay::replay_track(&mut tracker, reports, speed).await;

    print!("{}", tracker.score_report());
    Ok(())
}
