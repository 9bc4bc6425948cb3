use scraper::{ElementRef, Html, Selector};

use super::{ExtractedDocument, ExtractionError};

const SKIP_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td", "th", "figcaption",
];

/// HTML extraction: strips boilerplate (`script`, `style`, nav/
/// header/footer chrome) and preserves heading structure as paragraph
/// boundaries — each heading or paragraph-like element becomes its own
/// block in document order.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let text = String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    let document = Html::parse_document(&text);

    let body_selector = Selector::parse("body").map_err(|e| ExtractionError::Html(format!("{:?}", e)))?;
    let mut blocks: Vec<String> = Vec::new();

    if let Some(body) = document.select(&body_selector).next() {
        walk(body, &mut blocks);
    } else {
        walk(document.root_element(), &mut blocks);
    }

    if blocks.is_empty() {
        return Ok(ExtractedDocument::from_raw(vec![(String::new(), None)]));
    }

    Ok(ExtractedDocument::from_raw(
        blocks.into_iter().map(|b| (b, None)).collect(),
    ))
}

fn walk(el: ElementRef, blocks: &mut Vec<String>) {
    let tag = el.value().name();
    if SKIP_TAGS.contains(&tag) {
        return;
    }
    if BLOCK_TAGS.contains(&tag) {
        let text: String = el.text().collect::<Vec<_>>().join(" ");
        let text = normalize_whitespace(&text);
        if !text.is_empty() {
            blocks.push(text);
        }
        return;
    }
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            walk(child_el, blocks);
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings_and_paragraphs_in_order() {
        let html = b"<html><body><h1>Title</h1><p>First paragraph.</p><p>Second.</p></body></html>";
        let doc = extract(html).unwrap();
        let texts: Vec<&str> = doc.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Title", "First paragraph.", "Second."]);
    }

    #[test]
    fn strips_script_and_nav_boilerplate() {
        let html = b"<html><body><nav>Home | About</nav><script>var x = 1;</script><p>Real content.</p></body></html>";
        let doc = extract(html).unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "Real content.");
    }

    #[test]
    fn empty_document_still_emits_one_block() {
        let doc = extract(b"<html><body></body></html>").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "");
    }

    #[test]
    fn list_items_become_separate_blocks() {
        let html = b"<html><body><ul><li>One</li><li>Two</li></ul></body></html>";
        let doc = extract(html).unwrap();
        assert_eq!(doc.blocks.len(), 2);
    }
}
