//! The Monitor: accepts session events, batches writes
//! to `session_metrics_realtime`, fails over to an append-only JSONL log,
//! and republishes finalized metrics for the Notifier. Grounded on
//! `crates/server/src/ingestion/job_runner.rs` (`spawn_progress_monitor`'s
//! standalone task shape, `append_job_log`'s atomic-append JSONL pattern)
//! and `crates/queue/src/batcher.rs` (size-or-time micro-batch flush).

use std::collections::VecDeque;
use std::path::PathBuf;

use kb_core::config::MonitorConfig;
use kb_core::domain::{NotificationEvent, SessionMetric, SourceType};
use kb_queue::batcher::MicroBatcher;
use kb_store::MetricsStore;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, warn};

use crate::handle::SessionHandle;

/// Process-wide entry point. Cheap to clone — `open_session` only needs the
/// sender half of the session queue.
#[derive(Clone)]
pub struct Monitor {
    tx: mpsc::Sender<SessionMetric>,
    notify_tx: broadcast::Sender<NotificationEvent>,
}

impl Monitor {
    /// Spawns the writer task and returns a handle to it alongside the
    /// `Monitor` itself. `store` is `None` when Postgres was never
    /// configured.
    pub fn spawn(
        config: MonitorConfig,
        store: Option<MetricsStore>,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (notify_tx, _) = broadcast::channel(config.queue_capacity.max(16));
        let writer = Writer {
            config,
            store,
            notify_tx: notify_tx.clone(),
            failover_window: VecDeque::with_capacity(100),
        };
        let handle = tokio::spawn(writer.run(rx, shutdown));
        (Self { tx, notify_tx }, handle)
    }

    /// `open_session(url, source_type) -> handle`.
    pub fn open_session(&self, url: &str, source_type: SourceType) -> SessionHandle {
        SessionHandle::new(url, source_type, self.tx.clone())
    }

    /// Read-only channel of finalized metrics for the Notifier to subscribe
    /// to.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notify_tx.subscribe()
    }
}

struct Writer {
    config: MonitorConfig,
    store: Option<MetricsStore>,
    notify_tx: broadcast::Sender<NotificationEvent>,
    /// Rolling window of the last ≤100 written rows, `true` meaning the row
    /// went to the failover log instead of the database.
    failover_window: VecDeque<bool>,
}

impl Writer {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionMetric>, mut shutdown: broadcast::Receiver<()>) {
        let mut batcher: MicroBatcher<SessionMetric> = MicroBatcher::new(
            self.config.batch_max_rows,
            std::time::Duration::from_secs(self.config.batch_max_interval_secs),
        );
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
        ticker.tick().await;

        loop {
            tokio::select! {
                item = rx.recv() => {
                    match item {
                        Some(metric) => {
                            batcher.push(metric);
                            if let Some(batch) = batcher.try_flush() {
                                self.flush(batch).await;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if let Some(batch) = batcher.try_flush() {
                        self.flush(batch).await;
                    }
                }
                _ = shutdown.recv() => {
                    //  "bounded final flush (≤5s)": drain whatever is
                    // already buffered or waiting in the channel, then exit.
                    while let Ok(metric) = rx.try_recv() {
                        batcher.push(metric);
                    }
                    self.flush(batcher.flush()).await;
                    break;
                }
            }
        }

        // Final drain in case the channel closed (all handles dropped)
        // without an explicit shutdown signal.
        while let Ok(metric) = rx.try_recv() {
            batcher.push(metric);
        }
        if !batcher.is_empty() {
            self.flush(batcher.flush()).await;
        }
    }

    async fn flush(&mut self, batch: Vec<SessionMetric>) {
        if batch.is_empty() {
            return;
        }

        let stored = match &self.store {
            Some(store) => store.insert_batch(&batch).await.is_ok(),
            None => false,
        };

        if stored {
            for _ in &batch {
                self.push_window(false);
            }
        } else {
            if self.store.is_some() {
                warn!(rows = batch.len(), "session metrics insert failed, writing to failover log");
            }
            for metric in &batch {
                self.append_failover(metric).await;
                self.push_window(true);
            }
        }

        let degraded = self.is_degraded();
        for metric in batch {
            let event = NotificationEvent { metric, degraded };
            // No subscribers yet (e.g. Notifier not started) is not an
            // error — the event is simply not observed.
            let _ = self.notify_tx.send(event);
        }
    }

    fn push_window(&mut self, was_failover: bool) {
        if self.failover_window.len() >= 100 {
            self.failover_window.pop_front();
        }
        self.failover_window.push_back(was_failover);
    }

    fn is_degraded(&self) -> bool {
        if self.store.is_none() {
            return true;
        }
        if self.failover_window.is_empty() {
            return false;
        }
        let failed = self.failover_window.iter().filter(|b| **b).count();
        (failed as f64 / self.failover_window.len() as f64) > self.config.degraded_fraction_threshold
    }

    /// Grounded on `append_job_log`'s atomic-append JSONL pattern: one JSON
    /// object per line, `create + append`, never truncates existing rows.
    async fn append_failover(&self, metric: &SessionMetric) {
        let path = PathBuf::from(&self.config.failover_log_path);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(error = %e, "failed to create failover log directory");
                return;
            }
        }

        let line = match serde_json::to_string(metric) {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to serialize session metric for failover log");
                return;
            }
        };

        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await;
        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to open failover log");
                return;
            }
        };
        if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
            error!(error = %e, "failed to write failover log entry");
        }
    }
}
