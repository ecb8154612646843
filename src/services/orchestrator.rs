//! Contestant fan-out
//!
//! One worker task per contestant, each with a dedicated bounded report
//! channel. Contestants share no mutable state, so the fan-out needs no
//! locking; within a contestant, the channel serializes the pipeline.

use crate::domain::route::RouteDefinition;
use crate::domain::score::ScoreUpdate;
use crate::domain::types::{ContestantId, PositionReport};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::egress_channel::EgressSender;
use crate::services::tracker::ContestantTracker;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Shared read-mostly registry of the latest score per contestant
///
/// Written by the egress consumer, read by collaborators off the hot path.
#[derive(Clone, Default)]
pub struct ScoreBoard {
    inner: Arc<RwLock<FxHashMap<ContestantId, ScoreUpdate>>>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, update: ScoreUpdate) {
        self.inner.write().insert(update.contestant_id.clone(), update);
    }

    pub fn get(&self, contestant_id: &ContestantId) -> Option<ScoreUpdate> {
        self.inner.read().get(contestant_id).cloned()
    }

    pub fn all(&self) -> Vec<ScoreUpdate> {
        self.inner.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Spawns and feeds one tracker worker per contestant
pub struct Orchestrator {
    config: Config,
    workers: FxHashMap<ContestantId, mpsc::Sender<PositionReport>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config, workers: FxHashMap::default() }
    }

    /// Create a tracker per configured contestant and spawn its worker.
    ///
    /// Any tracker construction failure (bad route, missing gate times) is
    /// a configuration error and fails the whole startup.
    pub fn spawn_contestants(
        &mut self,
        definition: &RouteDefinition,
        metrics: &Arc<Metrics>,
        egress: Option<EgressSender>,
        shutdown: &watch::Receiver<bool>,
    ) -> anyhow::Result<usize> {
        let grace_secs = self.config.session_grace_secs();

        for contestant in self.config.contestants().to_vec() {
            let id = contestant.id.clone();
            let tracker =
                ContestantTracker::new(contestant, definition, metrics.clone(), egress.clone())?;

            let (tx, rx) = mpsc::channel(self.config.report_buffer());
            let worker_shutdown = shutdown.clone();
            tokio::spawn(async move {
                tracker.run(rx, worker_shutdown, grace_secs).await;
            });

            self.workers.insert(id, tx);
        }

        info!(contestants = %self.workers.len(), "contestant_workers_started");
        Ok(self.workers.len())
    }

    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Dispatch loop: route each inbound report to its contestant's worker
    pub async fn run(
        self,
        mut report_rx: mpsc::Receiver<PositionReport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                report = report_rx.recv() => {
                    match report {
                        Some(r) => self.dispatch(r),
                        None => break, // Channel closed
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("orchestrator_stopped");
    }

    fn dispatch(&self, report: PositionReport) {
        let Some(worker) = self.workers.get(&report.device_id) else {
            debug!(device_id = %report.device_id, "report_unknown_contestant");
            return;
        };

        if let Err(e) = worker.try_send(report) {
            // Worker queue full or worker gone; the report is lost
            warn!(error = %e, "report_dispatch_failed");
        }
    }
}
