use scraper::{Html, Selector};

use super::{html, ExtractedDocument, ExtractionError};

const POST_SELECTORS: &[&str] = &[
    "article",
    ".post-body",
    ".post-content",
    ".message-body",
    "[class*='post']",
];

/// Forum-post extraction. Forum pages are HTML, but the unit of
/// interest is the individual post rather than the paragraph: when common
/// post-container markup is present each post becomes one block; otherwise
/// this falls back to the generic HTML paragraph/heading extraction.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let text = String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    let document = Html::parse_document(&text);

    for raw_selector in POST_SELECTORS {
        let selector = match Selector::parse(raw_selector) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let posts: Vec<String> = document
            .select(&selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
            .collect();
        if !posts.is_empty() {
            return Ok(ExtractedDocument::from_raw(
                posts.into_iter().map(|p| (p, None)).collect(),
            ));
        }
    }

    html::extract(bytes)
}
