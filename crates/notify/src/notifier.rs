use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kb_core::config::NotifierConfig;
use kb_core::domain::NotificationEvent;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use crate::error::NotifyError;
use crate::message::{format_batch_summary, format_verbose_message};
use crate::quiet_hours::QuietHours;
use crate::rate_limiter::RateLimiter;
use crate::ring_buffer::RingBuffer;
use crate::transport::ChatTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierMode {
    Verbose,
    Batch,
}

impl NotifierMode {
    fn from_config_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("verbose") {
            NotifierMode::Verbose
        } else {
            NotifierMode::Batch
        }
    }
}

/// Notifier. Subscribes to a broadcast of [`NotificationEvent`]
/// published by the Monitor; never calls back into it.
pub struct Notifier {
    mode: NotifierMode,
    chat_id: String,
    transport: Arc<dyn ChatTransport>,
    rate_limiter: Mutex<RateLimiter>,
    quiet_hours: QuietHours,
    buffer: Mutex<RingBuffer<NotificationEvent>>,
    batch_cadence: Duration,
    failed_sends_log_path: PathBuf,
}

impl Notifier {
    pub fn new(config: &NotifierConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            mode: NotifierMode::from_config_str(&config.mode),
            chat_id: config.chat_id.clone().unwrap_or_default(),
            transport,
            rate_limiter: Mutex::new(RateLimiter::new(
                config.rate_limit_capacity,
                config.rate_limit_refill_per_60s,
            )),
            quiet_hours: QuietHours::new(config.quiet_start_hour, config.quiet_end_hour),
            buffer: Mutex::new(RingBuffer::new(config.batch_buffer_capacity as usize)),
            batch_cadence: Duration::from_secs(config.batch_cadence_secs),
            failed_sends_log_path: PathBuf::from(&config.failed_sends_log_path),
        }
    }

    /// Drive this notifier from a broadcast receiver until the channel
    /// closes or `shutdown` fires. Intended to be spawned as a background
    /// task by the worker binary.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<NotificationEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(self.batch_cadence);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(evt) => self.on_event(evt).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            error!(skipped = n, "notifier lagged behind monitor broadcast");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = ticker.tick() => {
                    if self.mode == NotifierMode::Batch {
                        self.flush_batch().await;
                    }
                }
                _ = shutdown.recv() => {
                    if self.mode == NotifierMode::Batch {
                        self.flush_batch().await;
                    }
                    break;
                }
            }
        }
    }

    async fn on_event(&self, event: NotificationEvent) {
        match self.mode {
            NotifierMode::Verbose => self.send_verbose(event).await,
            NotifierMode::Batch => {
                let overflowed = self.buffer.lock().await.push(event);
                if overflowed {
                    info!("notifier batch buffer overflowed, dropped oldest entry");
                }
            }
        }
    }

    async fn send_verbose(&self, event: NotificationEvent) {
        if self.quiet_hours.is_quiet_now() {
            return;
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        let acquired = self.rate_limiter.lock().await.acquire_or_deadline(deadline).await;
        if !acquired {
            info!("notifier rate limit exhausted, dropping verbose message");
            return;
        }
        let text = format_verbose_message(&event.metric, event.degraded);
        self.send_with_failover(&text).await;
    }

    async fn flush_batch(&self) {
        if self.quiet_hours.is_quiet_now() {
            // Buffer keeps accumulating (bounded by its own capacity) until
            // the next flush outside quiet hours.
            return;
        }
        let (items, overflow) = {
            let mut buf = self.buffer.lock().await;
            let items = buf.drain();
            let overflow = buf.take_overflow_count();
            (items, overflow)
        };
        if items.is_empty() && overflow == 0 {
            return;
        }
        let degraded = items.iter().any(|e| e.degraded);
        let metrics: Vec<_> = items.iter().map(|e| e.metric.clone()).collect();
        let text = format_batch_summary(&metrics, overflow, degraded);

        let deadline = Instant::now() + Duration::from_secs(5);
        let acquired = self.rate_limiter.lock().await.acquire_or_deadline(deadline).await;
        if !acquired {
            info!("notifier rate limit exhausted, dropping batch summary");
            return;
        }
        self.send_with_failover(&text).await;
    }

    async fn send_with_failover(&self, text: &str) {
        if let Err(e) = self.transport.send(&self.chat_id, text).await {
            error!(error = %e, "notifier transport failed after retries, writing to failover log");
            if let Err(io_err) = self.append_failover(text).await {
                error!(error = %io_err, "notifier failover log write failed");
            }
        }
    }

    async fn append_failover(&self, text: &str) -> Result<(), NotifyError> {
        if let Some(parent) = self.failed_sends_log_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| NotifyError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let record = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let line = format!("{}\n", serde_json::to_string(&record)?);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failed_sends_log_path)
            .await
            .map_err(|source| NotifyError::Io {
                path: self.failed_sends_log_path.display().to_string(),
                source,
            })?;
        file.write_all(line.as_bytes()).await.map_err(|source| NotifyError::Io {
            path: self.failed_sends_log_path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
