//! AWS SQS-backed [`Queue`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use chrono::Utc;
use tracing::{debug, info};

use kb_core::config::QueueConfig;

use crate::error::QueueError;
use crate::queue::{Queue, QueueHealth, QueueItem};

/// SQS-backed queue. The queue wire format is a bare URL string per
/// message body — no envelope, so there is nothing to parse on pop.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub async fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let queue_url = config
            .sqs_queue_url
            .clone()
            .ok_or_else(|| QueueError::Connection("SQS_QUEUE_URL not configured".into()))?;

        let region = aws_sdk_sqs::config::Region::new(config.aws_region.clone());
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        let client = Client::new(&shared_config);

        info!(queue_url = %queue_url, region = %config.aws_region, "SQS queue initialized");

        Ok(Self { client, queue_url })
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn push(&self, url: &str) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(url)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS send failed: {e:?}")))?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<QueueItem>, QueueError> {
        // SQS long-poll caps at 20s; the Worker's 5s default pop timeout
        // fits comfortably under that.
        let wait_secs = timeout.as_secs().clamp(1, 20) as i32;

        debug!(wait_secs, "polling SQS");

        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_secs)
            .message_system_attribute_names(aws_sdk_sqs::types::MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

        let Some(msg) = resp.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let url = msg.body().unwrap_or("").trim().to_string();
        let receipt_handle = msg
            .receipt_handle()
            .ok_or_else(|| QueueError::Parse("missing receipt handle".into()))?
            .to_string();
        let attempt_count = msg
            .attributes()
            .and_then(|attrs| {
                attrs.get(&aws_sdk_sqs::types::MessageSystemAttributeName::ApproximateReceiveCount)
            })
            .and_then(|c| c.parse::<u32>().ok())
            .unwrap_or(1);

        Ok(Some(QueueItem {
            url,
            receipt_handle,
            received_at: Utc::now(),
            attempt_count,
        }))
    }

    async fn ack(&self, item: &QueueItem) -> Result<(), QueueError> {
        debug!(receipt_handle = %item.receipt_handle, "acking SQS message");
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&item.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Ack(format!("SQS delete failed: {e:?}")))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

        let count = resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }
}
