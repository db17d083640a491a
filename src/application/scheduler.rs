// Ingestion scheduler - Bounded queue and worker pool in front of the dispatcher
use crate::application::dispatcher::FanOutDispatcher;
use crate::domain::error::SchedulerError;
use crate::domain::ingestion::{AcceptanceToken, IngestionResult};
use crate::domain::report::Report;
use crate::infrastructure::config::SchedulerSettings;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Counters describing ingestion since startup.
#[derive(Debug, Default)]
pub struct IngestionStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    samples_written: AtomicU64,
    channel_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub aborted: u64,
    pub samples_written: u64,
    pub channel_errors: u64,
}

impl IngestionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            channel_errors: self.channel_errors.load(Ordering::Relaxed),
        }
    }

    fn record_completed(&self, result: &IngestionResult) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.samples_written
            .fetch_add(result.total_written() as u64, Ordering::Relaxed);
        self.channel_errors
            .fetch_add(result.error_count() as u64, Ordering::Relaxed);
    }
}

struct QueuedReport {
    token: AcceptanceToken,
    report: Report,
}

/// Accepts reports on the request path and hands them to background workers.
///
/// Submissions never wait: when the backlog is full the report is rejected so the
/// station can retry later instead of holding its connection open.
#[derive(Clone)]
pub struct IngestionScheduler {
    tx: mpsc::Sender<QueuedReport>,
    capacity: usize,
    stats: Arc<IngestionStats>,
}

/// Worker tasks draining the ingestion queue.
pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl IngestionScheduler {
    pub fn start(
        dispatcher: Arc<FanOutDispatcher>,
        settings: &SchedulerSettings,
        stats: Arc<IngestionStats>,
    ) -> (Self, WorkerPool) {
        let capacity = settings.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..settings.workers.max(1) {
            workers.spawn(run_worker(
                worker_id,
                rx.clone(),
                dispatcher.clone(),
                stats.clone(),
            ));
        }

        tracing::info!(
            workers = settings.workers.max(1),
            queue_capacity = capacity,
            "ingestion workers started"
        );

        (
            Self {
                tx,
                capacity,
                stats,
            },
            WorkerPool { workers },
        )
    }

    /// Queue a report for background ingestion and return immediately.
    pub fn submit(&self, report: Report) -> Result<AcceptanceToken, SchedulerError> {
        let token = AcceptanceToken::issue();
        let device_id = report.device_id;

        match self.tx.try_send(QueuedReport {
            token: token.clone(),
            report,
        }) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(token = %token.token, device_id = %device_id, "report queued");
                Ok(token)
            }
            Err(TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    device_id = %device_id,
                    capacity = self.capacity,
                    "ingestion queue full, report rejected"
                );
                Err(SchedulerError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SchedulerError::Closed)
            }
        }
    }

    pub fn stats(&self) -> Arc<IngestionStats> {
        self.stats.clone()
    }
}

impl WorkerPool {
    /// Wait for the queue to drain and every worker to exit.
    ///
    /// Workers stop once all `IngestionScheduler` handles are dropped and the
    /// remaining queued reports are processed.
    pub async fn join(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "ingestion worker terminated abnormally");
            }
        }
        tracing::info!("ingestion workers stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedReport>>>,
    dispatcher: Arc<FanOutDispatcher>,
    stats: Arc<IngestionStats>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(QueuedReport { token, report }) = next else {
            break;
        };

        let device_id = report.device_id;
        let queued_ms = (Utc::now() - token.accepted_at).num_milliseconds();

        // Run each report in its own task so a panic only loses that report.
        let dispatcher = dispatcher.clone();
        let job = tokio::spawn(async move { dispatcher.ingest(&report).await });

        match job.await {
            Ok(Ok(result)) => {
                stats.record_completed(&result);
                tracing::info!(
                    worker_id,
                    token = %token.token,
                    device_id = %result.device_id,
                    queued_ms,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    samples = result.total_written(),
                    channel_errors = result.error_count(),
                    clean = result.is_clean(),
                    "report ingested"
                );
                for (kind, errors) in &result.per_channel_errors {
                    for error in errors {
                        tracing::warn!(
                            token = %token.token,
                            device_id = %result.device_id,
                            channel = %kind,
                            error = %error,
                            "channel ingestion problem"
                        );
                    }
                }
            }
            Ok(Err(e)) => {
                stats.aborted.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker_id,
                    token = %token.token,
                    device_id = %device_id,
                    error = %e,
                    "report ingestion aborted"
                );
            }
            Err(e) => {
                stats.aborted.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker_id,
                    token = %token.token,
                    device_id = %device_id,
                    error = %e,
                    "report ingestion task panicked"
                );
            }
        }
    }

    tracing::debug!(worker_id, "ingestion worker exiting");
}
