use kb_core::domain::Atom;

const ATOM_ID_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789_:-";

/// Validate one generated atom — a pure function. Rejects atoms that lack required content, have
/// an oversized title, a malformed `atom_id`, or no citation back to
/// `source_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub passed: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self { passed: true, reason: None }
    }

    fn fail(reason: &str) -> Self {
        Self {
            passed: false,
            reason: Some(reason.to_string()),
        }
    }
}

pub fn validate(atom: &Atom) -> ValidationResult {
    let content = atom.content.trim();
    if content.len() < 50 {
        return ValidationResult::fail("content shorter than 50 characters after trimming");
    }
    if atom.title.len() > 300 {
        return ValidationResult::fail("title longer than 300 characters");
    }
    if atom.atom_id.is_empty() || !atom.atom_id.chars().all(|c| ATOM_ID_CHARS.contains(c)) {
        return ValidationResult::fail("atom_id does not match [a-z0-9_:-]+");
    }
    if !atom.has_source_citation() {
        return ValidationResult::fail("no citation carries the source_url");
    }
    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kb_core::domain::{AtomType, Citation, ManualType};

    fn sample_atom() -> Atom {
        let now = Utc::now();
        Atom {
            atom_id: "acme:pump-200:overview".to_string(),
            title: "Overview".to_string(),
            content: "x".repeat(60),
            summary: None,
            keywords: vec![],
            citations: vec![Citation {
                id: 1,
                url: "https://example.com/manual.pdf".to_string(),
                title: "manual.pdf".to_string(),
                accessed_at: now,
            }],
            atom_type: AtomType::Concept,
            vendor: "Acme".to_string(),
            equipment_type: None,
            fault_codes: vec![],
            manual_quality_score: 70,
            page_count: Some(10),
            is_direct_pdf: true,
            manual_type: ManualType::TechnicalDoc,
            embedding: None,
            source_url: "https://example.com/manual.pdf".to_string(),
            created_at: now,
        }
    }

    #[test]
    fn valid_atom_passes() {
        assert!(validate(&sample_atom()).passed);
    }

    #[test]
    fn short_content_is_rejected() {
        let mut atom = sample_atom();
        atom.content = "too short".to_string();
        let result = validate(&atom);
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("content"));
    }

    #[test]
    fn oversized_title_is_rejected() {
        let mut atom = sample_atom();
        atom.title = "x".repeat(301);
        assert!(!validate(&atom).passed);
    }

    #[test]
    fn malformed_atom_id_is_rejected() {
        let mut atom = sample_atom();
        atom.atom_id = "Acme Pump 200".to_string();
        assert!(!validate(&atom).passed);
    }

    #[test]
    fn missing_source_citation_is_rejected() {
        let mut atom = sample_atom();
        atom.citations = vec![];
        assert!(!validate(&atom).passed);
    }
}
