//! TCP listener for live position reports
//!
//! Listens for connections from the tracking-device gateway. Protocol: one
//! JSON position report per line. Reports are forwarded to the orchestrator
//! channel with try_send so a slow pipeline never blocks the socket.

use crate::domain::types::PositionReport;
use crate::infra::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Report listener configuration
#[derive(Debug, Clone)]
pub struct ReportListenerConfig {
    pub port: u16,
    pub enabled: bool,
}

impl Default for ReportListenerConfig {
    fn default() -> Self {
        Self { port: 25410, enabled: true }
    }
}

/// Start the position report TCP listener
///
/// Accepts connections and forwards parsed reports to the orchestrator.
/// Reports are sent via try_send to avoid blocking - drops are counted in
/// metrics.
pub async fn start_report_listener(
    config: ReportListenerConfig,
    report_tx: mpsc::Sender<PositionReport>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.enabled {
        info!("report_listener_disabled");
        return Ok(());
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(port = %config.port, "report_listener_started");

    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("report_listener_shutdown");
                    return Ok(());
                }
            }
            // Accept new connections
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let tx = report_tx.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_report_connection(socket, addr, tx, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "report_listener_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_report_connection(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    report_tx: mpsc::Sender<PositionReport>,
    metrics: Arc<Metrics>,
) {
    let peer = addr.to_string();
    debug!(peer = %peer, "report_connection_accepted");

    let reader = BufReader::new(socket);
    let mut lines = reader.lines();

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let report: PositionReport = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(e) => {
                warn!(peer = %peer, error = %e, "report_parse_failed");
                continue;
            }
        };

        metrics.record_report_received();
        match report_tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics.record_report_dropped();
                // Rate-limit warning to 1 per second
                if last_drop_warn.elapsed() > Duration::from_secs(1) {
                    warn!(peer = %peer, "report_dropped: channel full");
                    last_drop_warn = Instant::now();
                }
            }
            Err(TrySendError::Closed(_)) => {
                warn!(peer = %peer, "report_channel_closed");
                return;
            }
        }
    }

    debug!(peer = %peer, "report_connection_closed");
}
