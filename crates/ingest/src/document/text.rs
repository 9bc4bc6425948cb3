use super::{ExtractedDocument, ExtractionError};

/// Plain-text extraction: a single unpaged block.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let text = String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    Ok(ExtractedDocument::from_raw(vec![(text.trim().to_string(), None)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_text() {
        let doc = extract(b"Hello, world!\nThis is a test file.").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert!(doc.blocks[0].text.contains("Hello, world!"));
        assert!(doc.blocks[0].page.is_none());
    }

    #[test]
    fn lossy_fallback_for_invalid_utf8() {
        let doc = extract(&[0xff, 0xfe, b'h', b'i']).unwrap();
        assert!(doc.blocks[0].text.contains("hi"));
    }

    #[test]
    fn empty_input_still_emits_one_block() {
        let doc = extract(b"").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let doc = extract(b"  \n  Hello  \n  ").unwrap();
        assert_eq!(doc.blocks[0].text, "Hello");
    }
}
