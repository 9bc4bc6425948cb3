//! The per-session handle returned by `Monitor::open_session`. Grounded on
//! `crates/server/src/ingestion/job_runner.rs`'s job
//! struct, which accumulates progress fields across a run and is flushed
//! once at the end — here the accumulation is `stage_ms`/quality samples
//! and the flush is `finish`.

use chrono::{DateTime, Utc};
use kb_core::domain::{url_hash, SessionMetric, SessionStatus, SourceType, Stage};
use tokio::sync::mpsc;
use tracing::warn;

/// A bounded, in-memory accumulator for exactly one ingestion session.
/// `record_stage` appends to fixed-size arrays — a session has exactly
/// seven stages, so there is nothing unbounded here.
pub struct SessionHandle {
    source_url: String,
    source_hash: String,
    source_type: SourceType,
    started_at: DateTime<Utc>,
    stage_ms: [u64; 7],
    error_stage: Option<Stage>,
    error_message: Option<String>,
    chunks_processed: u32,
    quality_scores: Vec<f64>,
    quality_pass_count: u32,
    vendor: Option<String>,
    equipment_type: Option<String>,
    tx: mpsc::Sender<SessionMetric>,
}

impl SessionHandle {
    pub(crate) fn new(url: &str, source_type: SourceType, tx: mpsc::Sender<SessionMetric>) -> Self {
        Self {
            source_url: url.to_string(),
            source_hash: url_hash(url),
            source_type,
            started_at: Utc::now(),
            stage_ms: [0; 7],
            error_stage: None,
            error_message: None,
            chunks_processed: 0,
            quality_scores: Vec::with_capacity(8),
            quality_pass_count: 0,
            vendor: None,
            equipment_type: None,
            tx,
        }
    }

    /// `record_stage(name, duration_ms, ok, metadata?)`.
    /// The first stage to report `ok = false` sets `error_stage`; later
    /// stages still record their own duration.
    pub fn record_stage(&mut self, stage: Stage, duration_ms: u64, ok: bool, metadata: Option<serde_json::Value>) {
        self.stage_ms[stage.index() - 1] = duration_ms;
        if !ok && self.error_stage.is_none() {
            self.error_stage = Some(stage);
            self.error_message = metadata
                .as_ref()
                .and_then(|m| m.get("error"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| metadata.map(|m| m.to_string()));
        }
    }

    pub fn record_chunk_count(&mut self, n: u32) {
        self.chunks_processed = n;
    }

    /// Accumulated by the Coordinator once per validated atom.
    pub fn record_atom_quality(&mut self, score: f64, passed_validation: bool) {
        self.quality_scores.push(score);
        if passed_validation {
            self.quality_pass_count += 1;
        }
    }

    pub fn set_vendor_hint(&mut self, vendor: Option<String>, equipment_type: Option<String>) {
        self.vendor = vendor;
        self.equipment_type = equipment_type;
    }

    /// `finish(atoms_created, atoms_failed, status, error?)`.
    /// Builds the final `SessionMetric` and hands it to the Monitor's
    /// in-process queue. Non-blocking: a full queue falls back to a
    /// synchronous failover write on a background task rather than stalling
    /// the caller past the ≤5 ms budget.
    pub async fn finish(
        self,
        atoms_created: u32,
        atoms_failed: u32,
        status: SessionStatus,
        error: Option<String>,
    ) {
        let total_duration_ms: u64 = self.stage_ms.iter().sum();
        let avg_quality_score = if self.quality_scores.is_empty() {
            0.0
        } else {
            self.quality_scores.iter().sum::<f64>() / self.quality_scores.len() as f64
        };
        let quality_pass_rate = if self.quality_scores.is_empty() {
            0.0
        } else {
            self.quality_pass_count as f64 / self.quality_scores.len() as f64
        };

        let metric = SessionMetric {
            source_url: self.source_url,
            source_hash: self.source_hash,
            source_type: self.source_type,
            status,
            atoms_created,
            atoms_failed,
            chunks_processed: self.chunks_processed,
            avg_quality_score,
            quality_pass_rate,
            stage_ms: self.stage_ms,
            total_duration_ms,
            error_stage: self.error_stage,
            error_message: error.or(self.error_message),
            vendor: self.vendor,
            equipment_type: self.equipment_type,
            started_at: self.started_at,
            completed_at: Utc::now(),
        };

        if let Err(err) = self.tx.try_send(metric) {
            let metric = match err {
                mpsc::error::TrySendError::Full(m) => m,
                mpsc::error::TrySendError::Closed(m) => m,
            };
            warn!(url = %metric.source_url, "monitor queue full, falling back to blocking send");
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(metric).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (SessionHandle, mpsc::Receiver<SessionMetric>) {
        let (tx, rx) = mpsc::channel(8);
        (SessionHandle::new("https://example.com/m.pdf", SourceType::Pdf, tx), rx)
    }

    #[tokio::test]
    async fn finish_computes_totals_and_averages() {
        let (mut h, mut rx) = handle();
        h.record_stage(Stage::Fetching, 100, true, None);
        h.record_stage(Stage::Extracting, 50, true, None);
        h.record_atom_quality(80.0, true);
        h.record_atom_quality(40.0, false);
        h.finish(1, 1, SessionStatus::Partial, None).await;

        let metric = rx.recv().await.unwrap();
        assert_eq!(metric.total_duration_ms, 150);
        assert_eq!(metric.avg_quality_score, 60.0);
        assert_eq!(metric.quality_pass_rate, 0.5);
        assert_eq!(metric.atoms_created, 1);
        assert_eq!(metric.atoms_failed, 1);
    }

    #[tokio::test]
    async fn first_failing_stage_sets_error_stage() {
        let (mut h, mut rx) = handle();
        h.record_stage(Stage::Fetching, 10, true, None);
        h.record_stage(Stage::Extracting, 5, false, Some(serde_json::json!({"error": "empty body"})));
        h.record_stage(Stage::Chunking, 0, false, Some(serde_json::json!({"error": "unreachable"})));
        h.finish(0, 0, SessionStatus::Failed, None).await;

        let metric = rx.recv().await.unwrap();
        assert_eq!(metric.error_stage, Some(Stage::Extracting));
        assert_eq!(metric.error_message.as_deref(), Some("empty body"));
    }

    #[tokio::test]
    async fn no_quality_samples_yields_zeroed_averages() {
        let (h, mut rx) = handle();
        h.finish(0, 0, SessionStatus::Success, None).await;
        let metric = rx.recv().await.unwrap();
        assert_eq!(metric.avg_quality_score, 0.0);
        assert_eq!(metric.quality_pass_rate, 0.0);
    }
}
