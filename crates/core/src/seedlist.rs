//! Seed-list file parsing: UTF-8, one URL per line, blank
//! lines and `#`-comment lines ignored, optional second whitespace-
//! separated column naming a vendor hint. Read independently by
//! `kb-scheduler` (to sweep and claim) and `kb-worker` (to recover the hint
//! for a popped URL, since the queue's wire format is URL-only).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub url: String,
    pub vendor_hint: Option<String>,
}

/// Parse seed-list file contents. Malformed lines (after trimming, neither
/// blank nor a comment, but without a parseable URL column) are skipped —
/// a seed list is operator-curated configuration, not user input; there is
/// no caller to report a parse error to.
pub fn parse_seed_list(contents: &str) -> Vec<SeedEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let url = parts.next()?.trim();
            if url.is_empty() {
                return None;
            }
            let vendor_hint = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string);
            Some(SeedEntry {
                url: url.to_string(),
                vendor_hint,
            })
        })
        .collect()
}

/// Look up the vendor hint for one URL within a seed list, read fresh from
/// disk. Returns `None` on any IO error or if the URL isn't present —
/// callers treat a missing hint as "no hint", never as a hard failure.
pub fn lookup_vendor_hint(path: &str, url: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_seed_list(&contents)
        .into_iter()
        .find(|e| e.url == url)
        .and_then(|e| e.vendor_hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_only_lines() {
        let entries = parse_seed_list("https://example.com/a.pdf\nhttps://example.com/b.pdf\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].vendor_hint, None);
    }

    #[test]
    fn parses_url_with_vendor_hint() {
        let entries = parse_seed_list("https://example.com/a.pdf   Acme\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].vendor_hint.as_deref(), Some("Acme"));
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let entries = parse_seed_list("# a comment\n\n   \nhttps://example.com/a.pdf\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn lookup_returns_none_for_unknown_url() {
        assert_eq!(lookup_vendor_hint("/nonexistent/path.txt", "https://example.com/x"), None);
    }
}
