use std::collections::HashMap;

use kb_core::domain::{SessionMetric, SessionStatus};

fn pct(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Batch message format. Field order is fixed and must not change.
pub fn format_batch_summary(metrics: &[SessionMetric], overflow_count: u64, degraded: bool) -> String {
    let total = metrics.len() as u32;
    let success = metrics
        .iter()
        .filter(|m| m.status == SessionStatus::Success)
        .count() as u32;
    let partial = metrics
        .iter()
        .filter(|m| m.status == SessionStatus::Partial)
        .count() as u32;
    let failed = metrics
        .iter()
        .filter(|m| m.status == SessionStatus::Failed)
        .count() as u32;

    let atoms_ok: u32 = metrics.iter().map(|m| m.atoms_created).sum();
    let atoms_fail: u32 = metrics.iter().map(|m| m.atoms_failed).sum();

    let avg_duration_ms = if total > 0 {
        metrics.iter().map(|m| m.total_duration_ms).sum::<u64>() / total as u64
    } else {
        0
    };
    // avg_quality_score is already on the 0-100 scale (see Coordinator,
    // which feeds the Quality Scorer's raw [0,100] score straight through).
    let avg_quality = if total > 0 {
        metrics.iter().map(|m| m.avg_quality_score).sum::<f64>() / total as f64
    } else {
        0.0
    };

    let mut vendor_counts: HashMap<String, u32> = HashMap::new();
    for m in metrics {
        if let Some(vendor) = &m.vendor {
            *vendor_counts.entry(vendor.clone()).or_insert(0) += 1;
        }
    }
    let mut vendors: Vec<(String, u32)> = vendor_counts.into_iter().collect();
    vendors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    vendors.truncate(5);

    let mut out = String::new();
    out.push_str("[STATS] KB Ingestion Summary (Last 5 min)\n\n");
    out.push_str(&format!("Sources: {} processed\n", total));
    out.push_str(&format!(
        "[OK] Success: {} ({:.0}%)\n",
        success,
        pct(success, total)
    ));
    out.push_str(&format!(
        "[WARN] Partial: {} ({:.0}%)\n",
        partial,
        pct(partial, total)
    ));
    out.push_str(&format!(
        "[FAIL] Failed: {} ({:.0}%)\n\n",
        failed,
        pct(failed, total)
    ));
    out.push_str(&format!("Atoms: {} created, {} failed\n", atoms_ok, atoms_fail));
    out.push_str(&format!("Avg Duration: {} ms\n", avg_duration_ms));
    out.push_str(&format!("Avg Quality: {:.0}%\n\n", avg_quality));
    out.push_str("Top Vendors:\n");
    if vendors.is_empty() {
        out.push_str("  - (none)\n");
    } else {
        for (vendor, count) in &vendors {
            out.push_str(&format!("  - {} ({} sources)\n", vendor, count));
        }
    }
    if overflow_count > 0 {
        out.push_str(&format!(
            "\n[WARN] {} session(s) dropped from buffer due to overflow\n",
            overflow_count
        ));
    }
    if degraded {
        out.push_str("\n[WARN] Monitor is degraded: failover write rate exceeds threshold\n");
    }
    out
}

/// VERBOSE mode formatter: one message per finished session, mirroring the
/// [OK]/[WARN]/[FAIL] tag style used in the batch summary.
pub fn format_verbose_message(metric: &SessionMetric, degraded: bool) -> String {
    let tag = match metric.status {
        SessionStatus::Success => "[OK]",
        SessionStatus::Partial => "[WARN]",
        SessionStatus::Failed => "[FAIL]",
    };
    let mut out = format!(
        "{} {} — {} atoms created, {} failed ({} ms)\n",
        tag, metric.source_url, metric.atoms_created, metric.atoms_failed, metric.total_duration_ms
    );
    if let Some(stage) = metric.error_stage {
        out.push_str(&format!("  error_stage: {:?}\n", stage));
    }
    if let Some(msg) = &metric.error_message {
        out.push_str(&format!("  error_message: {}\n", msg));
    }
    if degraded {
        out.push_str("  [WARN] monitor degraded\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kb_core::domain::SourceType;

    fn sample(status: SessionStatus, vendor: Option<&str>) -> SessionMetric {
        let now = Utc::now();
        SessionMetric {
            source_url: "https://example.com/manual.pdf".into(),
            source_hash: "abc123".into(),
            source_type: SourceType::Pdf,
            status,
            atoms_created: 3,
            atoms_failed: 0,
            chunks_processed: 5,
            avg_quality_score: 80.0,
            quality_pass_rate: 1.0,
            stage_ms: [10, 10, 10, 10, 10, 10, 10],
            total_duration_ms: 70,
            error_stage: None,
            error_message: None,
            vendor: vendor.map(|v| v.to_string()),
            equipment_type: None,
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn batch_summary_has_stable_field_order() {
        let metrics = vec![
            sample(SessionStatus::Success, Some("Acme")),
            sample(SessionStatus::Partial, Some("Acme")),
            sample(SessionStatus::Failed, Some("Globex")),
        ];
        let msg = format_batch_summary(&metrics, 0, false);
        let idx = |needle: &str| msg.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
        assert!(idx("Sources:") < idx("[OK] Success:"));
        assert!(idx("[OK] Success:") < idx("[WARN] Partial:"));
        assert!(idx("[WARN] Partial:") < idx("[FAIL] Failed:"));
        assert!(idx("[FAIL] Failed:") < idx("Atoms:"));
        assert!(idx("Atoms:") < idx("Avg Duration:"));
        assert!(idx("Avg Duration:") < idx("Avg Quality:"));
        assert!(idx("Avg Quality:") < idx("Top Vendors:"));
    }

    #[test]
    fn batch_summary_counts_match_input() {
        let metrics = vec![
            sample(SessionStatus::Success, Some("Acme")),
            sample(SessionStatus::Success, None),
        ];
        let msg = format_batch_summary(&metrics, 0, false);
        assert!(msg.contains("Sources: 2 processed"));
        assert!(msg.contains("Atoms: 6 created, 0 failed"));
        assert!(msg.contains("Avg Quality: 80%"));
    }

    #[test]
    fn overflow_and_degraded_flags_are_surfaced() {
        let msg = format_batch_summary(&[], 4, true);
        assert!(msg.contains("4 session(s) dropped"));
        assert!(msg.contains("degraded"));
    }

    #[test]
    fn verbose_message_tags_by_status() {
        let m = sample(SessionStatus::Failed, None);
        let msg = format_verbose_message(&m, false);
        assert!(msg.starts_with("[FAIL]"));
    }
}
