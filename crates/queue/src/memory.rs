//! In-process queue backend for local development and tests. Satisfies the
//! same [`Queue`] trait as [`crate::sqs::SqsQueue`] so the Worker and
//! Scheduler binaries are indifferent to which backend is configured
//! (`QUEUE_BACKEND=memory|sqs`).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::QueueError;
use crate::queue::{Queue, QueueHealth, QueueItem};

pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn push(&self, url: &str) -> Result<(), QueueError> {
        self.items.lock().unwrap().push_back(url.to_string());
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<QueueItem>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(url) = self.items.lock().unwrap().pop_front() {
                return Ok(Some(QueueItem {
                    url,
                    receipt_handle: Uuid::new_v4().to_string(),
                    received_at: Utc::now(),
                    attempt_count: 1,
                }));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn ack(&self, _item: &QueueItem) -> Result<(), QueueError> {
        // Already removed from the buffer on pop; nothing to do.
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some(self.items.lock().unwrap().len() as u64),
            provider: "memory".to_string(),
        })
    }
}
