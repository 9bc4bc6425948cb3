//! The Pipeline Coordinator: the seven-stage state
//! machine driving one session from `FETCHING` through `STORING`. Grounded
//! on `crates/server/src/ingestion/job_runner.rs`'s `run_ingestion_job`
//! (status-transition shape: explicit match per stage, log-and-continue on
//! recoverable failure, one terminal status write).

use std::sync::Arc;
use std::time::Instant;

use kb_core::domain::{Atom, Source, SessionStatus, Stage};
use kb_ingest::embedding::{embed_batch_with_retry, Embedder};
use kb_ingest::{chunk_document, detect_features, extract, score, sniff_source_type, validate, AtomGenerator, Fetcher};
use kb_llm::LlmProvider;
use kb_monitor::Monitor;
use kb_store::{AtomStore, FingerprintIndex};
use tracing::warn;

use crate::error::CoordinatorError;

pub struct Coordinator {
    fetcher: Fetcher,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
    fingerprint: Arc<FingerprintIndex>,
    atom_store: Arc<AtomStore>,
    monitor: Monitor,
    llm_temperature: f32,
    llm_max_tokens: u32,
    embedding_batch_size: usize,
    embedding_max_retries: u32,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Fetcher,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        fingerprint: Arc<FingerprintIndex>,
        atom_store: Arc<AtomStore>,
        monitor: Monitor,
        llm_temperature: f32,
        llm_max_tokens: u32,
        embedding_batch_size: usize,
        embedding_max_retries: u32,
    ) -> Self {
        Self {
            fetcher,
            llm,
            embedder,
            fingerprint,
            atom_store,
            monitor,
            llm_temperature,
            llm_max_tokens,
            embedding_batch_size,
            embedding_max_retries,
        }
    }

    /// Run one session for `url` to completion. Never returns an error —
    /// every outcome, including a failed session, is recorded on the
    /// `SessionMetric` and the Fingerprint Index; nothing propagates to the
    /// caller.
    pub async fn run_session(&self, url: &str, vendor_hint: Option<String>) {
        let guessed_type = sniff_source_type(url, None);
        let mut session = self.monitor.open_session(url, guessed_type);
        session.set_vendor_hint(vendor_hint.clone(), None);

        self.fingerprint.mark_running(url).await;

        // ── FETCHING ────────────────────────────────────────────────
        let stage_start = Instant::now();
        let fetched = match self.fetcher.fetch(url).await {
            Ok(f) => {
                session.record_stage(Stage::Fetching, elapsed_ms(stage_start), true, None);
                f
            }
            Err(e) => {
                session.record_stage(
                    Stage::Fetching,
                    elapsed_ms(stage_start),
                    false,
                    Some(serde_json::json!({"error": e.to_string()})),
                );
                self.fail(session, url, CoordinatorError::from(e).to_string()).await;
                return;
            }
        };

        let source_type = sniff_source_type(url, fetched.content_type.as_deref());
        let source = Source {
            url: url.to_string(),
            source_type,
            vendor_hint: vendor_hint.clone(),
        };

        // ── EXTRACTING ──────────────────────────────────────────────
        let stage_start = Instant::now();
        let extracted = match extract(source_type, &fetched.bytes) {
            Ok(doc) => {
                session.record_stage(Stage::Extracting, elapsed_ms(stage_start), true, None);
                doc
            }
            Err(e) => {
                session.record_stage(
                    Stage::Extracting,
                    elapsed_ms(stage_start),
                    false,
                    Some(serde_json::json!({"error": e.to_string()})),
                );
                self.fail(session, url, CoordinatorError::from(e).to_string()).await;
                return;
            }
        };

        // ── CHUNKING ────────────────────────────────────────────────
        let stage_start = Instant::now();
        let chunks = chunk_document(&extracted, url);
        session.record_chunk_count(chunks.len() as u32);

        if chunks.is_empty() {
            session.record_stage(
                Stage::Chunking,
                elapsed_ms(stage_start),
                false,
                Some(serde_json::json!({"error": "source_too_small"})),
            );
            self.finish_ok(
                session,
                url,
                0,
                0,
                SessionStatus::Partial,
                Some("source_too_small".to_string()),
            )
            .await;
            return;
        }
        session.record_stage(Stage::Chunking, elapsed_ms(stage_start), true, None);

        // ── GENERATING ──────────────────────────────────────────────
        let stage_start = Instant::now();
        let mut generator = AtomGenerator::new(self.llm_temperature, self.llm_max_tokens);
        let mut atoms: Vec<Atom> = Vec::new();
        for chunk in &chunks {
            atoms.extend(generator.generate_for_chunk(self.llm.as_ref(), chunk, &source).await);
        }
        session.record_stage(
            Stage::Generating,
            elapsed_ms(stage_start),
            true,
            Some(serde_json::json!({"atoms_generated": atoms.len()})),
        );

        if atoms.is_empty() {
            self.finish_ok(
                session,
                url,
                0,
                0,
                SessionStatus::Partial,
                Some("no_atoms_generated".to_string()),
            )
            .await;
            return;
        }
        let generated_count = atoms.len() as u32;

        // ── VALIDATING ──────────────────────────────────────────────
        let stage_start = Instant::now();
        let is_direct_pdf = !fetched.redirected;
        let page_count = extracted.page_count as u32;
        let features = detect_features(&extracted.joined_text(), page_count, is_direct_pdf);
        let (quality, manual_type) = score(&features);

        let mut validated: Vec<Atom> = Vec::new();
        let mut failed_validation: u32 = 0;
        for mut atom in atoms {
            atom.manual_quality_score = quality;
            atom.manual_type = manual_type;
            atom.page_count = Some(page_count);
            atom.is_direct_pdf = is_direct_pdf;

            let result = validate(&atom);
            session.record_atom_quality(quality as f64, result.passed);
            if result.passed {
                validated.push(atom);
            } else {
                failed_validation += 1;
            }
        }
        session.record_stage(
            Stage::Validating,
            elapsed_ms(stage_start),
            true,
            Some(serde_json::json!({"passed": validated.len(), "failed": failed_validation})),
        );

        if validated.is_empty() {
            self.finish_ok(
                session,
                url,
                0,
                generated_count,
                SessionStatus::Partial,
                Some("all_atoms_failed_validation".to_string()),
            )
            .await;
            return;
        }

        if let Some(first) = validated.first() {
            session.set_vendor_hint(
                merge_vendor_hint(vendor_hint.clone(), &first.vendor),
                first.equipment_type.clone(),
            );
        }

        // ── EMBEDDING ───────────────────────────────────────────────
        let stage_start = Instant::now();
        let mut embedded: Vec<Atom> = Vec::new();
        let mut failed_embedding: u32 = 0;
        for batch in validated.chunks_mut(self.embedding_batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|a| a.content.as_str()).collect();
            match embed_batch_with_retry(self.embedder.as_ref(), &texts, self.embedding_max_retries).await {
                Ok(vectors) => {
                    for (atom, vector) in batch.iter_mut().zip(vectors) {
                        atom.embedding = Some(vector);
                        embedded.push(atom.clone());
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, count = batch.len(), "embedding batch failed, demoting atoms");
                    failed_embedding += batch.len() as u32;
                }
            }
        }
        session.record_stage(
            Stage::Embedding,
            elapsed_ms(stage_start),
            true,
            Some(serde_json::json!({"embedded": embedded.len(), "failed": failed_embedding})),
        );

        if embedded.is_empty() {
            self.finish_ok(
                session,
                url,
                0,
                generated_count,
                SessionStatus::Partial,
                Some("no_atoms_embedded".to_string()),
            )
            .await;
            return;
        }

        // ── STORING ─────────────────────────────────────────────────
        let stage_start = Instant::now();
        let mut stored: u32 = 0;
        let mut failed_store: u32 = 0;
        for atom in &embedded {
            match self.atom_store.upsert_atom(atom).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    warn!(url = %url, atom_id = %atom.atom_id, error = %e, "atom store upsert failed");
                    failed_store += 1;
                }
            }
        }
        session.record_stage(Stage::Storing, elapsed_ms(stage_start), stored > 0, None);

        let atoms_failed = failed_validation + failed_embedding + failed_store;
        let status = session_status(stored, atoms_failed);
        let error = if stored == 0 {
            Some("all_atoms_failed_to_store".to_string())
        } else {
            None
        };

        self.finish_ok(session, url, stored, atoms_failed, status, error).await;
    }

    async fn finish_ok(
        &self,
        session: kb_monitor::SessionHandle,
        url: &str,
        atoms_created: u32,
        atoms_failed: u32,
        status: SessionStatus,
        error: Option<String>,
    ) {
        session.finish(atoms_created, atoms_failed, status, error).await;
        let outcome = if status == SessionStatus::Failed {
            kb_core::domain::FingerprintStatus::Failed
        } else {
            kb_core::domain::FingerprintStatus::Completed
        };
        self.fingerprint.mark_completed(url, outcome).await;
    }

    /// A hard stage failure (Fetching/Extracting). Always `status=Failed`.
    async fn fail(&self, session: kb_monitor::SessionHandle, url: &str, error: String) {
        session.finish(0, 0, SessionStatus::Failed, Some(error)).await;
        self.fingerprint.mark_completed(url, kb_core::domain::FingerprintStatus::Failed).await;
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Final status rule: zero atoms stored is always `Failed`, any
/// partial loss along the way downgrades an otherwise-successful session
/// to `Partial`, never back up to `Success`.
fn session_status(stored: u32, atoms_failed: u32) -> SessionStatus {
    if stored == 0 {
        SessionStatus::Failed
    } else if atoms_failed > 0 {
        SessionStatus::Partial
    } else {
        SessionStatus::Success
    }
}

/// A seed-list vendor hint always wins over a value read
/// off the generated atom; the atom's own vendor field only fills in when
/// no hint was supplied.
fn merge_vendor_hint(hint: Option<String>, atom_vendor: &str) -> Option<String> {
    hint.or_else(|| Some(atom_vendor.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_failed_when_nothing_stored_even_with_no_failures() {
        assert_eq!(session_status(0, 0), SessionStatus::Failed);
    }

    #[test]
    fn status_is_partial_when_some_atoms_failed() {
        assert_eq!(session_status(3, 1), SessionStatus::Partial);
    }

    #[test]
    fn status_is_success_when_everything_stored_cleanly() {
        assert_eq!(session_status(3, 0), SessionStatus::Success);
    }

    #[test]
    fn seed_list_hint_wins_over_atom_vendor() {
        let merged = merge_vendor_hint(Some("Acme".to_string()), "OtherCorp");
        assert_eq!(merged.as_deref(), Some("Acme"));
    }

    #[test]
    fn atom_vendor_fills_in_when_no_hint_given() {
        let merged = merge_vendor_hint(None, "OtherCorp");
        assert_eq!(merged.as_deref(), Some("OtherCorp"));
    }
}
