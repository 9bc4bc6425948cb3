use super::{ExtractedDocument, ExtractionError};

/// PDF extraction: per-page text, preserving page ordering even
/// for scanned/image pages (which yield an empty-text block).
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        // pdf-extract succeeded but found no text (scanned/image PDF).
        return Ok(ExtractedDocument::from_raw(vec![(String::new(), Some(1))]));
    }

    let pages: Vec<(String, Option<usize>)> = if text.contains('\x0C') {
        text.split('\x0C')
            .enumerate()
            .map(|(i, page_text)| (page_text.trim().to_string(), Some(i + 1)))
            .collect()
    } else {
        vec![(trimmed.to_string(), Some(1))]
    };

    Ok(ExtractedDocument::from_raw(pages))
}
