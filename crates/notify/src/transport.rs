use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::error::NotifyError;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// HTTPS POST transport to an external chat API. Retries on transient failure with
/// exponential backoff, honoring `Retry-After` on 429 responses.
pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
    auth_header: Option<String>,
}

impl HttpChatTransport {
    pub fn new(endpoint: String, auth_header: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            auth_header,
        }
    }

    async fn send_once(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let mut req = self.client.post(&self.endpoint).json(&ChatPayload { chat_id, text });
        if let Some(auth) = &self.auth_header {
            req = req.header("Authorization", auth.clone());
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(secs) = retry_after {
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
        }
        let body = resp.text().await.unwrap_or_default();
        Err(NotifyError::Transport {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    /// Retried up to 3 times with exponential backoff (1s, 2s, 4s);
    /// terminal failure is logged and never propagated to callers.
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let mut delay = Duration::from_secs(1);
        let mut last_err = None;
        for attempt in 0..3 {
            match self.send_once(chat_id, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "chat transport send failed");
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingTransport {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChatTransport for FailingTransport {
        async fn send(&self, _chat_id: &str, _text: &str) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Transport {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn failing_transport_reports_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let t = FailingTransport { calls: calls.clone() };
        let result = t.send("abc", "hello").await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
