use thiserror::Error;

/// Internal errors for the Monitor's writer task. Nothing here ever reaches
/// a session: Monitor failures are logged and swallowed, never propagated
/// into the pipeline.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("session queue closed")]
    QueueClosed,
    #[error("failover log io error: {0}")]
    FailoverIo(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] kb_store::StoreError),
}
