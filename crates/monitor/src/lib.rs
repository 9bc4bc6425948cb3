//! The Ingestion Monitor: accepts session events from
//! the Coordinator, batches writes to `session_metrics_realtime`, fails
//! over to an append-only log when the store is unreachable, and
//! republishes finalized metrics for the Notifier to subscribe to.

pub mod error;
pub mod handle;
pub mod monitor;

pub use error::MonitorError;
pub use handle::SessionHandle;
pub use monitor::Monitor;
