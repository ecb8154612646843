//! navscore - real-time navigation-scoring engine
//!
//! Consumes a stream of aircraft position fixes per contestant and
//! incrementally computes gate crossings, a continuous tracking state and a
//! monotonically accumulating penalty score.
//!
//! Module structure:
//! - `domain/` - Core types (PositionReport, Route, Gate, ScoreState)
//! - `io/` - External interfaces (report listener, egress channel, score log)
//! - `services/` - Business logic (tracker, orchestrator, detector, scorer)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use navscore::domain::route::RouteDefinition;
use navscore::infra::{Config, Metrics};
use navscore::io::{
    create_egress_channel, start_report_listener, EgressMessage, ReportListenerConfig, ScoreLog,
};
use navscore::services::{Orchestrator, ScoreBoard};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// navscore - navigation contest scoring service
#[derive(Parser, Debug)]
#[command(name = "navscore", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full pipeline visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "navscore starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        contest = %config.contest_id(),
        route_file = %config.route_file(),
        listener_port = %config.listener_port(),
        egress_file = %config.egress_file(),
        contestants = %config.contestants().len(),
        session_grace_secs = %config.session_grace_secs(),
        "config_loaded"
    );

    let definition = RouteDefinition::from_file(config.route_file())
        .with_context(|| format!("cannot load route {}", config.route_file()))?;

    if config.contestants().is_empty() {
        warn!("no contestants configured; incoming reports will be ignored");
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let scoreboard = ScoreBoard::new();

    // Egress channel, score log writer and latest-score registry
    let (egress_sender, mut egress_rx) =
        create_egress_channel(config.egress_buffer(), config.contest_id().to_string());
    let score_log = ScoreLog::new(config.egress_file());
    let consumer_board = scoreboard.clone();
    tokio::spawn(async move {
        while let Some(message) = egress_rx.recv().await {
            match message {
                EgressMessage::Score(update) => {
                    score_log.write_update(&update);
                    consumer_board.publish(update);
                }
                EgressMessage::Track(event) => {
                    info!(
                        contestant = %event.contestant_id,
                        session = %event.session,
                        event = %event.t,
                        "track_lifecycle"
                    );
                }
            }
        }
    });

    // Inbound report channel (bounded for backpressure)
    let (report_tx, report_rx) = mpsc::channel(1000);

    // Start the contestant workers
    let mut orchestrator = Orchestrator::new(config.clone());
    orchestrator.spawn_contestants(
        &definition,
        &metrics,
        Some(egress_sender),
        &shutdown_rx,
    )?;
    let active_workers = orchestrator.active_workers();

    // Start the TCP report listener
    let listener_config = ReportListenerConfig {
        port: config.listener_port(),
        enabled: config.listener_enabled(),
    };
    let listener_metrics = metrics.clone();
    let listener_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            start_report_listener(listener_config, report_tx, listener_metrics, listener_shutdown)
                .await
        {
            tracing::error!(error = %e, "report listener error");
        }
    });

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = metrics_clone.report(active_workers);
            summary.log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run the dispatch loop - consumes reports until channel closes
    info!("orchestrator_started");
    orchestrator.run(report_rx, shutdown_rx).await;

    info!("navscore shutdown complete");
    Ok(())
}
