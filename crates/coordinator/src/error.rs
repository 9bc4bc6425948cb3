use thiserror::Error;

/// Stage-level failures that end a session in `FAILED`: any stage may
/// transition to `FAILED` with an error_stage label. Only Fetching and
/// Extracting can produce one of these — every later stage degrades the
/// session to `partial` instead (see `coordinator.rs`).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    Fetch(#[from] kb_core::error::FetchError),
    #[error("{0}")]
    Extract(#[from] kb_ingest::ExtractionError),
}
