use thiserror::Error;

/// Errors common to every stage of the ingestion core. Stage-specific crates
/// (kb-ingest, kb-store, kb-notify, ...) define their own error enums and
/// convert into this one at the coordinator boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Transient-vs-permanent taxonomy for the Fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("http {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("unreachable host for {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("oversized response for {url}: {size_bytes} bytes exceeds cap of {cap_bytes}")]
    Oversized {
        url: String,
        size_bytes: u64,
        cap_bytes: u64,
    },
}

impl FetchError {
    /// Timeouts and 5xx are transient, everything
    /// else (4xx, oversized, unreachable) is permanent. The queue replay is
    /// the only retry path either way, so this only affects logging/metrics
    /// labeling, not control flow.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Http { status, .. } => (500..600).contains(status),
            FetchError::Unreachable { .. } | FetchError::Oversized { .. } => false,
        }
    }
}
