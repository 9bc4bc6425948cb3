//! Shared data model: the types that flow between every stage of the
//! pipeline and are persisted by kb-store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Truncated SHA-256 of the canonical URL — the Fingerprint Index's key.
/// Truncated to 16 bytes (32 hex chars) to keep the index compact; the
/// probability of collision at this length is not a concern at the scale
/// this core operates at.
pub fn url_hash(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    hex::encode(&digest[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Html,
    Forum,
    Text,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceType::Pdf => "pdf",
            SourceType::Html => "html",
            SourceType::Forum => "forum",
            SourceType::Text => "text",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceType::Pdf),
            "html" => Ok(SourceType::Html),
            "forum" => Ok(SourceType::Forum),
            "text" => Ok(SourceType::Text),
            other => Err(format!("unknown source_type: {other}")),
        }
    }
}

/// A URL plus the hint carried from a seed-list entry. The vendor hint is
/// advisory and never persisted onto `Atom`.
#[derive(Debug, Clone)]
pub struct Source {
    pub url: String,
    pub source_type: SourceType,
    pub vendor_hint: Option<String>,
}

impl Source {
    pub fn url_hash(&self) -> String {
        url_hash(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for FingerprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FingerprintStatus::Queued => "queued",
            FingerprintStatus::Running => "running",
            FingerprintStatus::Completed => "completed",
            FingerprintStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A durable claim record over one canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub url_hash: String,
    pub url: String,
    pub source_type: SourceType,
    pub discovered_at: DateTime<Utc>,
    pub queued_at: DateTime<Utc>,
    pub ingestion_started_at: Option<DateTime<Utc>>,
    pub ingestion_completed_at: Option<DateTime<Utc>>,
    pub status: FingerprintStatus,
}

/// One contiguous span of extracted text, the chunker's output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_url: String,
    pub order_index: u32,
    pub text: String,
    pub page_number: Option<u32>,
    pub byte_offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomType {
    Concept,
    Procedure,
    Specification,
    Pattern,
    Troubleshooting,
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AtomType::Concept => "concept",
            AtomType::Procedure => "procedure",
            AtomType::Specification => "specification",
            AtomType::Pattern => "pattern",
            AtomType::Troubleshooting => "troubleshooting",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualType {
    ComprehensiveManual,
    TechnicalDoc,
    PartialDoc,
    Marketing,
    Unknown,
}

impl std::fmt::Display for ManualType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ManualType::ComprehensiveManual => "comprehensive_manual",
            ManualType::TechnicalDoc => "technical_doc",
            ManualType::PartialDoc => "partial_doc",
            ManualType::Marketing => "marketing",
            ManualType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: u32,
    pub url: String,
    pub title: String,
    pub accessed_at: DateTime<Utc>,
}

/// An Atom — the durable output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub atom_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub keywords: Vec<String>,
    pub citations: Vec<Citation>,
    pub atom_type: AtomType,
    pub vendor: String,
    pub equipment_type: Option<String>,
    pub fault_codes: Vec<String>,
    pub manual_quality_score: i32,
    pub page_count: Option<u32>,
    pub is_direct_pdf: bool,
    pub manual_type: ManualType,
    pub embedding: Option<Vec<f32>>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

impl Atom {
    /// Invariant (a): every atom carries at least one citation whose URL
    /// equals `source_url`.
    pub fn has_source_citation(&self) -> bool {
        self.citations.iter().any(|c| c.url == self.source_url)
    }

    /// Invariant (b): `comprehensive_manual` atoms require score >= 90 and a
    /// direct (non-redirected) fetch.
    pub fn satisfies_manual_type_invariant(&self) -> bool {
        if self.manual_type == ManualType::ComprehensiveManual {
            self.manual_quality_score >= 90 && self.is_direct_pdf
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Success => "success",
            SessionStatus::Partial => "partial",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The seven pipeline stages, used both as coordinator state and as
/// the metric column index (`stage_1_ms` .. `stage_7_ms`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Extracting,
    Chunking,
    Generating,
    Validating,
    Embedding,
    Storing,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Fetching,
        Stage::Extracting,
        Stage::Chunking,
        Stage::Generating,
        Stage::Validating,
        Stage::Embedding,
        Stage::Storing,
    ];

    /// 1-based index matching `stage_i_ms` column naming.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).expect("Stage::ALL is exhaustive") + 1
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Fetching => "FETCHING",
            Stage::Extracting => "EXTRACTING",
            Stage::Chunking => "CHUNKING",
            Stage::Generating => "GENERATING",
            Stage::Validating => "VALIDATING",
            Stage::Embedding => "EMBEDDING",
            Stage::Storing => "STORING",
        };
        write!(f, "{s}")
    }
}

/// One row per ingestion attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetric {
    pub source_url: String,
    pub source_hash: String,
    pub source_type: SourceType,
    pub status: SessionStatus,
    pub atoms_created: u32,
    pub atoms_failed: u32,
    pub chunks_processed: u32,
    pub avg_quality_score: f64,
    pub quality_pass_rate: f64,
    pub stage_ms: [u64; 7],
    pub total_duration_ms: u64,
    pub error_stage: Option<Stage>,
    pub error_message: Option<String>,
    pub vendor: Option<String>,
    pub equipment_type: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SessionMetric {
    /// Testable property 3: stage-time additivity, within 1ms of rounding
    /// slack.
    pub fn stage_times_additive(&self) -> bool {
        let sum: u64 = self.stage_ms.iter().sum();
        self.total_duration_ms.abs_diff(sum) <= 1
    }
}

/// Derived from a finalized `SessionMetric`.
///
/// The Monitor publishes these on a broadcast channel; the Notifier
/// subscribes. `degraded` carries the Monitor's failover-fraction flag so
/// the Notifier can surface it without a second channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub metric: SessionMetric,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_hash_is_stable_and_deterministic() {
        let a = url_hash("https://example.com/manual.pdf");
        let b = url_hash("https://example.com/manual.pdf");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn url_hash_differs_across_urls() {
        let a = url_hash("https://example.com/a.pdf");
        let b = url_hash("https://example.com/b.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn stage_index_is_1_based_and_ordered() {
        assert_eq!(Stage::Fetching.index(), 1);
        assert_eq!(Stage::Storing.index(), 7);
    }

    #[test]
    fn stage_times_additive_allows_1ms_slack() {
        let m = sample_metric([10, 20, 30, 0, 0, 0, 0], 61);
        assert!(m.stage_times_additive());
        let m2 = sample_metric([10, 20, 30, 0, 0, 0, 0], 62);
        assert!(!m2.stage_times_additive());
    }

    fn sample_metric(stage_ms: [u64; 7], total: u64) -> SessionMetric {
        let now = Utc::now();
        SessionMetric {
            source_url: "https://example.com/a.pdf".into(),
            source_hash: url_hash("https://example.com/a.pdf"),
            source_type: SourceType::Pdf,
            status: SessionStatus::Success,
            atoms_created: 1,
            atoms_failed: 0,
            chunks_processed: 1,
            avg_quality_score: 80.0,
            quality_pass_rate: 1.0,
            stage_ms,
            total_duration_ms: total,
            error_stage: None,
            error_message: None,
            vendor: None,
            equipment_type: None,
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn atom_citation_invariant() {
        let mut atom = sample_atom();
        assert!(atom.has_source_citation());
        atom.citations.clear();
        assert!(!atom.has_source_citation());
    }

    #[test]
    fn comprehensive_manual_invariant() {
        let mut atom = sample_atom();
        atom.manual_type = ManualType::ComprehensiveManual;
        atom.manual_quality_score = 95;
        atom.is_direct_pdf = true;
        assert!(atom.satisfies_manual_type_invariant());
        atom.is_direct_pdf = false;
        assert!(!atom.satisfies_manual_type_invariant());
    }

    fn sample_atom() -> Atom {
        let now = Utc::now();
        Atom {
            atom_id: "ab:plc:intro".into(),
            title: "Intro".into(),
            content: "x".repeat(60),
            summary: None,
            keywords: vec![],
            citations: vec![Citation {
                id: 1,
                url: "https://example.com/a.pdf".into(),
                title: "a.pdf".into(),
                accessed_at: now,
            }],
            atom_type: AtomType::Concept,
            vendor: "ab".into(),
            equipment_type: Some("plc".into()),
            fault_codes: vec![],
            manual_quality_score: 50,
            page_count: Some(10),
            is_direct_pdf: true,
            manual_type: ManualType::PartialDoc,
            embedding: None,
            source_url: "https://example.com/a.pdf".into(),
            created_at: now,
        }
    }
}
