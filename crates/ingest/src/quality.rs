use kb_core::domain::ManualType;

/// Whole-source features consumed by the quality scorer. Features
/// that cannot be computed are left at their zero value; the scorer never
/// throws.
#[derive(Debug, Clone, Default)]
pub struct DocumentFeatures {
    pub page_count: u32,
    pub has_parameters: bool,
    pub has_fault_codes: bool,
    pub has_specifications: bool,
    pub has_diagrams: bool,
    pub has_table_of_contents: bool,
    pub is_direct_pdf: bool,
}

const PARAMETER_KEYWORDS: &[&str] = &["parameter", "parameters", "setting", "settings"];
const FAULT_CODE_KEYWORDS: &[&str] = &["fault code", "error code", "fault codes", "error codes"];
const SPECIFICATION_KEYWORDS: &[&str] = &["specification", "specifications", "spec sheet"];
const DIAGRAM_KEYWORDS: &[&str] = &["diagram", "wiring", "schematic"];
const TOC_KEYWORDS: &[&str] = &["table of contents", "contents\n"];

/// Derive [`DocumentFeatures`] from the full extracted text and whether the
/// source was fetched directly (not via redirect).
pub fn detect_features(full_text: &str, page_count: u32, is_direct_pdf: bool) -> DocumentFeatures {
    let lower = full_text.to_lowercase();
    let head: String = lower.chars().take(5000).collect();
    DocumentFeatures {
        page_count,
        has_parameters: contains_any(&lower, PARAMETER_KEYWORDS),
        has_fault_codes: contains_any(&lower, FAULT_CODE_KEYWORDS),
        has_specifications: contains_any(&lower, SPECIFICATION_KEYWORDS),
        has_diagrams: contains_any(&lower, DIAGRAM_KEYWORDS),
        has_table_of_contents: contains_any(&head, TOC_KEYWORDS),
        is_direct_pdf,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Score a source from its extracted features — a pure function, clamped to [0, 100].
pub fn score(features: &DocumentFeatures) -> (i32, ManualType) {
    let mut points: i32 = 0;

    points += match features.page_count {
        p if p >= 200 => 30,
        p if p >= 100 => 25,
        p if p >= 50 => 15,
        _ => 0,
    };
    if features.has_parameters {
        points += 20;
    }
    if features.has_fault_codes {
        points += 15;
    }
    if features.has_specifications {
        points += 15;
    }
    if features.has_diagrams {
        points += 10;
    }
    if features.has_table_of_contents {
        points += 10;
    }
    if !features.is_direct_pdf {
        points -= 30;
    }

    let clamped = points.clamp(0, 100);
    let label = match clamped {
        s if s >= 90 => ManualType::ComprehensiveManual,
        s if s >= 70 => ManualType::TechnicalDoc,
        s if s >= 50 => ManualType::PartialDoc,
        _ => ManualType::Marketing,
    };
    (clamped, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comprehensive_manual_requires_high_score() {
        let features = DocumentFeatures {
            page_count: 250,
            has_parameters: true,
            has_fault_codes: true,
            has_specifications: true,
            has_diagrams: true,
            has_table_of_contents: true,
            is_direct_pdf: true,
        };
        let (points, label) = score(&features);
        assert_eq!(points, 100);
        assert_eq!(label, ManualType::ComprehensiveManual);
    }

    #[test]
    fn redirect_penalty_clamped_at_zero() {
        let features = DocumentFeatures {
            page_count: 0,
            is_direct_pdf: false,
            ..Default::default()
        };
        let (points, label) = score(&features);
        assert_eq!(points, 0);
        assert_eq!(label, ManualType::Marketing);
    }

    #[test]
    fn quality_monotonicity_adding_keyword_never_decreases_score() {
        let base = DocumentFeatures {
            page_count: 120,
            is_direct_pdf: true,
            ..Default::default()
        };
        let (base_score, _) = score(&base);
        let mut with_param = base.clone();
        with_param.has_parameters = true;
        let (param_score, _) = score(&with_param);
        assert!(param_score >= base_score);
    }

    #[test]
    fn redirect_flag_decreases_score_by_exactly_30_when_not_clamped() {
        let base = DocumentFeatures {
            page_count: 120,
            has_parameters: true,
            is_direct_pdf: true,
            ..Default::default()
        };
        let (base_score, _) = score(&base);
        let mut redirected = base.clone();
        redirected.is_direct_pdf = false;
        let (redirected_score, _) = score(&redirected);
        assert_eq!(base_score - redirected_score, 30);
    }

    #[test]
    fn classification_is_a_step_function_of_score() {
        let a = DocumentFeatures {
            page_count: 100,
            has_parameters: true,
            is_direct_pdf: true,
            ..Default::default()
        };
        let b = DocumentFeatures {
            page_count: 100,
            has_fault_codes: true,
            is_direct_pdf: true,
            ..Default::default()
        };
        let (score_a, label_a) = score(&a);
        let (score_b, label_b) = score(&b);
        assert_eq!(score_a, score_b);
        assert_eq!(label_a, label_b);
    }

    #[test]
    fn detect_features_never_panics_on_empty_text() {
        let features = detect_features("", 0, true);
        let (points, _) = score(&features);
        assert!((0..=100).contains(&points));
    }
}
