//! Queue trait and types.
//!
//! Wire format: each queue entry is a bare UTF-8 string equal to the
//! canonical URL. No envelope — unlike a JSON-bodied `QueueMessage`, there is
//! nothing to parse.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::QueueError;

/// An item popped from the queue, carrying whatever handle the backend needs
/// to acknowledge it afterwards.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url: String,
    pub receipt_handle: String,
    pub received_at: DateTime<Utc>,
    pub attempt_count: u32,
}

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub connected: bool,
    pub approximate_message_count: Option<u64>,
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// The durable FIFO of pending URLs.
///
/// Implementations handle the specifics of pushing, long-polling, and
/// acknowledging for a particular backend (SQS, in-memory for dev/test).
#[async_trait]
pub trait Queue: Send + Sync {
    /// Push a canonical URL onto the queue. Duplicate entries are tolerated
    /// — the Fingerprint Index, not the queue, is the dedup layer.
    async fn push(&self, url: &str) -> Result<(), QueueError>;

    /// Pop a single item, blocking up to `timeout`. Returns `None` on
    /// timeout — the Worker treats this as a liveness tick, not an error.
    async fn pop(&self, timeout: Duration) -> Result<Option<QueueItem>, QueueError>;

    /// Acknowledge processing — removes the item from the queue. Called
    /// whether the session that processed it succeeded, was partial, or
    /// failed; queue-level retry is not how this system re-attempts a URL
    /// (a fresh Scheduler sweep or an operator clearing the Fingerprint
    /// Index is).
    async fn ack(&self, item: &QueueItem) -> Result<(), QueueError>;

    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}
