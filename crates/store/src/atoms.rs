//! The Atom Store. Grounded on `crates/server/src/vector_store.rs`'s
//! `ChunkInsert`/pgvector
//! insert shape, extended to an upsert-by-`atom_id` keyed table instead of
//! `vector_store`'s append-only chunks.

use kb_core::domain::Atom;
use pgvector::Vector;
use serde_json::Value as Json;
use sqlx::{PgPool, Row};

use crate::error::StoreError;

pub struct AtomStore {
    pool: PgPool,
}

impl AtomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts an atom keyed by `atom_id`; on conflict, replace content and bump the
    /// version counter. Idempotent — upserting the same atom twice leaves
    /// `atom_id` and content unchanged but still increments `version` (the
    /// column exists to let an operator tell a no-op upsert apart from a
    /// genuine content change at the SQL level; the core itself does not
    /// read it).
    pub async fn upsert_atom(&self, atom: &Atom) -> Result<(), StoreError> {
        let keywords = Json::from(atom.keywords.clone());
        let citations = serde_json::to_value(&atom.citations).unwrap_or(Json::Array(vec![]));
        let fault_codes = Json::from(atom.fault_codes.clone());
        let embedding = atom.embedding.clone().map(Vector::from);

        sqlx::query(
            "INSERT INTO atoms (
                atom_id, title, content, summary, keywords, citations, atom_type,
                vendor, equipment_type, fault_codes, manual_quality_score, page_count,
                is_direct_pdf, manual_type, embedding, source_url, version, created_at, updated_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,1,$17,$17)
             ON CONFLICT (atom_id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                summary = EXCLUDED.summary,
                keywords = EXCLUDED.keywords,
                citations = EXCLUDED.citations,
                atom_type = EXCLUDED.atom_type,
                vendor = EXCLUDED.vendor,
                equipment_type = EXCLUDED.equipment_type,
                fault_codes = EXCLUDED.fault_codes,
                manual_quality_score = EXCLUDED.manual_quality_score,
                page_count = EXCLUDED.page_count,
                is_direct_pdf = EXCLUDED.is_direct_pdf,
                manual_type = EXCLUDED.manual_type,
                embedding = EXCLUDED.embedding,
                source_url = EXCLUDED.source_url,
                version = atoms.version + 1,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(&atom.atom_id)
        .bind(&atom.title)
        .bind(&atom.content)
        .bind(&atom.summary)
        .bind(&keywords)
        .bind(&citations)
        .bind(atom.atom_type.to_string())
        .bind(&atom.vendor)
        .bind(&atom.equipment_type)
        .bind(&fault_codes)
        .bind(atom.manual_quality_score)
        .bind(atom.page_count.map(|p| p as i32))
        .bind(atom.is_direct_pdf)
        .bind(atom.manual_type.to_string())
        .bind(&embedding)
        .bind(&atom.source_url)
        .bind(atom.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// `exists_atom` — used by the Atom Generator's cross-session
    /// dedup path (in addition to the in-session content-hash dedup already
    /// performed by `kb_ingest::generator::AtomGenerator`).
    pub async fn exists_atom(&self, atom_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM atoms WHERE atom_id = $1")
            .bind(atom_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_version(&self, atom_id: &str) -> Result<Option<i32>, StoreError> {
        let row = sqlx::query("SELECT version FROM atoms WHERE atom_id = $1")
            .bind(atom_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i32, _>("version")))
    }
}
