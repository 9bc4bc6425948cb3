pub mod chunker;
pub mod forum;
pub mod html;
pub mod pdf;
pub mod text;

use kb_core::domain::SourceType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One ordered block of extracted text. `position` is the block's
/// 0-based index within the document; `page` is set only for paginated
/// sources (PDF).
#[derive(Debug, Clone)]
pub struct Block {
    pub text: String,
    pub page: Option<usize>,
    pub position: usize,
}

/// Ordered extraction result for one source. Invariant: at least one block
/// is always present, even for an empty document (a block with empty text).
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub blocks: Vec<Block>,
    pub page_count: usize,
}

impl ExtractedDocument {
    /// Testable property 10 support: concatenation of all block text with a
    /// single space separator.
    pub fn joined_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn total_chars(&self) -> usize {
        self.blocks.iter().map(|b| b.text.chars().count()).sum()
    }

    pub(crate) fn from_raw(texts_with_pages: Vec<(String, Option<usize>)>) -> Self {
        let page_count = texts_with_pages
            .iter()
            .filter_map(|(_, p)| *p)
            .max()
            .unwrap_or(1);
        let blocks = texts_with_pages
            .into_iter()
            .enumerate()
            .map(|(position, (text, page))| Block { text, page, position })
            .collect();
        ExtractedDocument { blocks, page_count }
    }
}

/// Dispatch extraction by source type.
pub fn extract(source_type: SourceType, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    match source_type {
        SourceType::Pdf => pdf::extract(bytes),
        SourceType::Html => html::extract(bytes),
        SourceType::Forum => forum::extract(bytes),
        SourceType::Text => text::extract(bytes),
    }
}

const FORUM_HOST_MARKERS: &[&str] = &["forum", "community", "discourse", "discuss."];

/// Resolve the `source_type` the extractor should dispatch on. The URL
/// extension is the primary signal; the `Content-Type` response header,
/// when present, overrides a `text`/`html` guess but never downgrades a
/// `.pdf` URL that happened to be served with a generic content type.
pub fn sniff_source_type(url: &str, content_type: Option<&str>) -> SourceType {
    let lower_url = url.to_lowercase();
    let path = lower_url.split(['?', '#']).next().unwrap_or(&lower_url);

    if path.ends_with(".pdf") {
        return SourceType::Pdf;
    }

    if let Some(ct) = content_type {
        let ct = ct.to_lowercase();
        if ct.contains("application/pdf") {
            return SourceType::Pdf;
        }
        if ct.contains("text/html") {
            return if FORUM_HOST_MARKERS.iter().any(|m| lower_url.contains(m)) {
                SourceType::Forum
            } else {
                SourceType::Html
            };
        }
        if ct.contains("text/plain") {
            return SourceType::Text;
        }
    }

    if FORUM_HOST_MARKERS.iter().any(|m| lower_url.contains(m)) {
        return SourceType::Forum;
    }
    if path.ends_with(".htm") || path.ends_with(".html") || lower_url.starts_with("http") {
        return SourceType::Html;
    }
    SourceType::Text
}

#[cfg(test)]
mod sniff_tests {
    use super::*;

    #[test]
    fn pdf_extension_wins_regardless_of_content_type() {
        assert_eq!(
            sniff_source_type("https://example.com/manual.pdf", Some("application/octet-stream")),
            SourceType::Pdf
        );
    }

    #[test]
    fn forum_host_marker_overrides_generic_html() {
        assert_eq!(
            sniff_source_type("https://forum.example.com/t/123", Some("text/html; charset=utf-8")),
            SourceType::Forum
        );
    }

    #[test]
    fn plain_html_without_forum_marker() {
        assert_eq!(
            sniff_source_type("https://example.com/docs/page", Some("text/html")),
            SourceType::Html
        );
    }

    #[test]
    fn content_type_used_when_no_recognized_extension() {
        assert_eq!(sniff_source_type("https://example.com/api/export", Some("text/plain")), SourceType::Text);
    }
}
