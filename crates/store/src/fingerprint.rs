//! The Fingerprint Index: content-addressed at-most-once
//! claim over canonical URLs. Grounded on `IngestionSourceStore`'s
//! conditional-claim CRUD shape (`crates/server/src/ingestion/source_store.rs`)
//! adapted to an `INSERT ... WHERE NOT EXISTS` claim instead of plain CRUD.
//!
//! Every public method here is infallible from the caller's point of view:
//! a missing table, or any other database error, is logged and treated as a
//! successful claim.

use chrono::Utc;
use kb_core::domain::{url_hash, FingerprintStatus, SourceType};
use sqlx::PgPool;
use tracing::warn;

use crate::error::StoreError;

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimResult {
    pub claimed: bool,
    pub existing_status: Option<FingerprintStatus>,
}

pub struct FingerprintIndex {
    pool: PgPool,
}

impl FingerprintIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// : insert-if-absent. Returns `claimed=true` on first call for a
    /// URL, `claimed=false` with the current status otherwise. Never fails
    /// the caller — a missing table or other database error is logged and
    /// treated as `claimed=true` so ingestion is never blocked by an
    /// optional dedup layer.
    pub async fn try_claim(&self, url: &str, source_type: SourceType) -> ClaimResult {
        match self.try_claim_inner(url, source_type).await {
            Ok(result) => result,
            Err(e) if e.is_table_missing() => {
                warn!(url = %url, "fingerprint_index table is absent, proceeding unclaimed");
                ClaimResult { claimed: true, existing_status: None }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "fingerprint index error, proceeding as claimed");
                ClaimResult { claimed: true, existing_status: None }
            }
        }
    }

    async fn try_claim_inner(&self, url: &str, source_type: SourceType) -> Result<ClaimResult, StoreError> {
        let hash = url_hash(url);
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO fingerprint_index (url_hash, url, source_type, discovered_at, queued_at, status)
             SELECT $1, $2, $3, $4, $4, 'queued'
             WHERE NOT EXISTS (SELECT 1 FROM fingerprint_index WHERE url_hash = $1)",
        )
        .bind(&hash)
        .bind(url)
        .bind(source_type.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(ClaimResult { claimed: true, existing_status: None });
        }

        let status_str: String =
            sqlx::query_scalar("SELECT status FROM fingerprint_index WHERE url_hash = $1")
                .bind(&hash)
                .fetch_one(&self.pool)
                .await?;
        Ok(ClaimResult {
            claimed: false,
            existing_status: parse_status(&status_str),
        })
    }

    /// `mark_running` — idempotent; sets `ingestion_started_at` on the
    /// first call only, so repeated calls (e.g. a retried coordinator path)
    /// never move the timestamp forward.
    pub async fn mark_running(&self, url: &str) {
        let hash = url_hash(url);
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE fingerprint_index
             SET status = 'running', ingestion_started_at = COALESCE(ingestion_started_at, $2)
             WHERE url_hash = $1",
        )
        .bind(&hash)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if !StoreError::from(e).is_table_missing() {
                warn!(url = %url, "fingerprint index mark_running failed");
            }
        }
    }

    /// `mark_completed` — idempotent; `outcome` is `Completed` or
    /// `Failed`. `ingestion_completed_at` is set monotonic after
    /// `ingestion_started_at` because the coordinator always
    /// calls `mark_running` first in the same session.
    pub async fn mark_completed(&self, url: &str, outcome: FingerprintStatus) {
        let hash = url_hash(url);
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE fingerprint_index SET status = $2, ingestion_completed_at = $3 WHERE url_hash = $1",
        )
        .bind(&hash)
        .bind(outcome.to_string())
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if !StoreError::from(e).is_table_missing() {
                warn!(url = %url, "fingerprint index mark_completed failed");
            }
        }
    }
}

fn parse_status(s: &str) -> Option<FingerprintStatus> {
    match s {
        "queued" => Some(FingerprintStatus::Queued),
        "running" => Some(FingerprintStatus::Running),
        "completed" => Some(FingerprintStatus::Completed),
        "failed" => Some(FingerprintStatus::Failed),
        _ => None,
    }
}
