//! Analysis worker: bounded queue of document ids, run with limited concurrency.
//!
//! Delivery is at-most-once. [`AnalysisQueue::submit`] never waits; when the
//! queue is full or the worker has stopped the id is dropped and logged, and
//! the document stays `uploading` until it is triggered again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use intake_core::defaults::{
    ANALYSIS_MAX_CONCURRENT, ANALYSIS_QUEUE_CAPACITY, ANALYSIS_TIMEOUT_SECS, EVENT_BUS_CAPACITY,
};
use intake_core::{Error, Result};

use crate::lifecycle::LifecycleController;

/// Configuration for the analysis worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Whether submitted runs are processed at all.
    pub enabled: bool,
    /// Maximum runs in flight at once.
    pub max_concurrent: usize,
    /// Per-run budget in seconds.
    pub timeout_secs: u64,
    /// Queued ids beyond this are dropped.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: ANALYSIS_MAX_CONCURRENT,
            timeout_secs: ANALYSIS_TIMEOUT_SECS,
            queue_capacity: ANALYSIS_QUEUE_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ANALYSIS_WORKER_ENABLED` | `true` | Enable/disable background runs |
    /// | `ANALYSIS_MAX_CONCURRENT` | `4` | Max runs in flight |
    /// | `ANALYSIS_TIMEOUT_SECS` | `60` | Per-run budget |
    /// | `ANALYSIS_QUEUE_CAPACITY` | `256` | Pending submissions kept |
    pub fn from_env() -> Self {
        let enabled = std::env::var("ANALYSIS_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = std::env::var("ANALYSIS_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(ANALYSIS_MAX_CONCURRENT)
            .max(1);

        let timeout_secs = std::env::var("ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(ANALYSIS_TIMEOUT_SECS);

        let queue_capacity = std::env::var("ANALYSIS_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(ANALYSIS_QUEUE_CAPACITY)
            .max(1);

        Self {
            enabled,
            max_concurrent,
            timeout_secs,
            queue_capacity,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Zero is ignored and keeps the current budget.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        if secs > 0 {
            self.timeout_secs = secs;
        }
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Event emitted by the analysis worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    RunStarted { document_id: Uuid },
    RunCompleted { document_id: Uuid, version: i32 },
    /// The run ended with the document in `error`.
    RunFailed { document_id: Uuid, error: String },
    /// The run never started: unknown document or already analysing.
    RunRejected { document_id: Uuid, reason: String },
    WorkerStarted,
    WorkerStopped,
}

/// Submission side of the worker. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisQueue {
    tx: mpsc::Sender<Uuid>,
    enabled: bool,
}

impl AnalysisQueue {
    /// Enqueue a run without waiting. Returns `false` if the id was dropped.
    pub fn submit(&self, document_id: Uuid) -> bool {
        match self.tx.try_send(document_id) {
            Ok(()) => {
                debug!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "submit",
                    document_id = %document_id,
                    "Analysis queued"
                );
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "submit",
                    document_id = %document_id,
                    "Analysis queue full; submission dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) if !self.enabled => {
                warn!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "submit",
                    document_id = %document_id,
                    "Analysis worker disabled; document stays uploading until analysed on request"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    subsystem = "jobs",
                    component = "queue",
                    op = "submit",
                    document_id = %document_id,
                    "Analysis worker not running; submission dropped"
                );
                false
            }
        }
    }
}

/// Handle for controlling a running worker. Dropping it stops the worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop accepting runs, drop anything still queued, and wait for in-flight runs.
    ///
    /// A worker that already exited (or never started because it is disabled)
    /// shuts down cleanly.
    pub async fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!(
                subsystem = "jobs",
                component = "worker",
                "Analysis worker already stopped"
            );
        }
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {}", e)))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Consumes the queue and drives the lifecycle controller.
pub struct AnalysisWorker {
    controller: LifecycleController,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl AnalysisWorker {
    /// The controller's run timeout is set from `config`.
    pub fn new(controller: LifecycleController, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let controller = controller.with_run_timeout(config.timeout());
        Self {
            controller,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn the worker loop.
    pub fn start(self) -> (AnalysisQueue, WorkerHandle) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let enabled = self.config.enabled;

        let join = tokio::spawn(async move {
            self.run(rx, shutdown_rx).await;
        });

        (
            AnalysisQueue { tx, enabled },
            WorkerHandle {
                shutdown_tx,
                event_rx,
                join,
            },
        )
    }

    async fn run(self, mut rx: mpsc::Receiver<Uuid>, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            warn!(
                subsystem = "jobs",
                component = "worker",
                "Analysis worker is disabled; uploads are only analysed on request"
            );
            return;
        }

        info!(
            subsystem = "jobs",
            component = "worker",
            max_concurrent = self.config.max_concurrent,
            timeout_secs = self.config.timeout_secs,
            queue_capacity = self.config.queue_capacity,
            "Analysis worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut dropped = 0usize;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "jobs", component = "worker", "Analysis worker received shutdown signal");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(subsystem = "jobs", component = "worker", error = ?e, "Analysis task panicked");
                    }
                }
                next = rx.recv() => {
                    let Some(document_id) = next else { break };
                    // All slots busy: keep listening for shutdown while waiting
                    let permit = tokio::select! {
                        acquired = permits.clone().acquire_owned() => match acquired {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                        _ = shutdown_rx.recv() => {
                            info!(subsystem = "jobs", component = "worker", "Analysis worker received shutdown signal");
                            dropped += 1;
                            break;
                        }
                    };
                    let run = self.clone_refs();
                    tasks.spawn(async move {
                        run.execute(document_id).await;
                        drop(permit);
                    });
                }
            }
        }

        rx.close();
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(
                subsystem = "jobs",
                component = "worker",
                dropped,
                "Queued analyses dropped at shutdown"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(subsystem = "jobs", component = "worker", error = ?e, "Analysis task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(subsystem = "jobs", component = "worker", "Analysis worker stopped");
    }

    fn clone_refs(&self) -> RunRef {
        RunRef {
            controller: self.controller.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

/// What a spawned run needs.
struct RunRef {
    controller: LifecycleController,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl RunRef {
    async fn execute(self, document_id: Uuid) {
        let start = Instant::now();
        let _ = self.event_tx.send(WorkerEvent::RunStarted { document_id });

        let event = match self.controller.run(document_id).await {
            Ok(analysis) => WorkerEvent::RunCompleted {
                document_id,
                version: analysis.version,
            },
            Err(e @ (Error::Conflict(_) | Error::DocumentNotFound(_))) => {
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    document_id = %document_id,
                    reason = %e,
                    "Analysis run rejected"
                );
                WorkerEvent::RunRejected {
                    document_id,
                    reason: e.to_string(),
                }
            }
            Err(e) => WorkerEvent::RunFailed {
                document_id,
                error: e.to_string(),
            },
        };

        debug!(
            subsystem = "jobs",
            component = "worker",
            document_id = %document_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis task finished"
        );
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn test_worker_config_builder_clamps() {
        let config = WorkerConfig::default()
            .with_max_concurrent(0)
            .with_queue_capacity(0)
            .with_timeout_secs(5)
            .with_enabled(false);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(!config.enabled);
    }

    #[test]
    fn test_zero_timeout_is_ignored() {
        let config = WorkerConfig::default().with_timeout_secs(0);
        assert_eq!(config.timeout_secs, ANALYSIS_TIMEOUT_SECS);

        let config = WorkerConfig::default().with_timeout_secs(5).with_timeout_secs(0);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_submit_to_stopped_worker_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let queue = AnalysisQueue { tx, enabled: true };
        assert!(!queue.submit(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_submit_when_full_is_dropped() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = AnalysisQueue { tx, enabled: true };
        assert!(queue.submit(Uuid::new_v4()));
        assert!(!queue.submit(Uuid::new_v4()));
    }
}
