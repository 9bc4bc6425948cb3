//! Durable storage: the Fingerprint Index, the Atom Store, and the
//! `session_metrics_realtime` table, over PostgreSQL + pgvector. Grounded on
//! `crates/server/src/{vector_store,ingestion/source_store}.rs`.

pub mod atoms;
pub mod error;
pub mod fingerprint;
pub mod metrics;
pub mod pool;

pub use atoms::AtomStore;
pub use error::StoreError;
pub use fingerprint::{ClaimResult, FingerprintIndex};
pub use metrics::MetricsStore;
pub use pool::connect;
