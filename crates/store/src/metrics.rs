//! `session_metrics_realtime` writer. Used
//! exclusively by `kb-monitor`'s batched writer — this module only knows how
//! to turn a batch of `SessionMetric` into parameterized inserts inside one
//! transaction; the batching policy (50 rows / 5s) lives in kb-monitor.

use kb_core::domain::SessionMetric;
use sqlx::PgPool;

use crate::error::StoreError;

pub struct MetricsStore {
    pool: PgPool,
}

impl MetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of finalized session metrics in one transaction.
    /// Parameterized statements only.
    pub async fn insert_batch(&self, metrics: &[SessionMetric]) -> Result<(), StoreError> {
        if metrics.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for m in metrics {
            sqlx::query(
                "INSERT INTO session_metrics_realtime (
                    source_url, source_hash, source_type, status, atoms_created, atoms_failed,
                    chunks_processed, avg_quality_score, quality_pass_rate,
                    stage_1_ms, stage_2_ms, stage_3_ms, stage_4_ms, stage_5_ms, stage_6_ms, stage_7_ms,
                    total_duration_ms, error_stage, error_message, vendor, equipment_type,
                    started_at, completed_at
                 ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)",
            )
            .bind(&m.source_url)
            .bind(&m.source_hash)
            .bind(m.source_type.to_string())
            .bind(m.status.to_string())
            .bind(m.atoms_created as i32)
            .bind(m.atoms_failed as i32)
            .bind(m.chunks_processed as i32)
            .bind(m.avg_quality_score)
            .bind(m.quality_pass_rate)
            .bind(m.stage_ms[0] as i64)
            .bind(m.stage_ms[1] as i64)
            .bind(m.stage_ms[2] as i64)
            .bind(m.stage_ms[3] as i64)
            .bind(m.stage_ms[4] as i64)
            .bind(m.stage_ms[5] as i64)
            .bind(m.stage_ms[6] as i64)
            .bind(m.total_duration_ms as i64)
            .bind(m.error_stage.map(|s| s.to_string()))
            .bind(&m.error_message)
            .bind(&m.vendor)
            .bind(&m.equipment_type)
            .bind(m.started_at)
            .bind(m.completed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
