//! Semantic chunking: splits an extracted document's blocks into
//! contiguous, non-overlapping chunks in the 800-1500 character target
//! range, hard-capped at 2000, with a 200-character floor below which the
//! whole source is reported as too small to chunk. Splits preferentially
//! at paragraph, then sentence, then whitespace boundaries.

use kb_core::domain::Chunk;

use super::ExtractedDocument;

pub const TARGET_MIN: usize = 800;
pub const TARGET_MAX: usize = 1500;
pub const HARD_MAX: usize = 2000;
pub const MIN_SOURCE_CHARS: usize = 200;

struct Piece {
    text: String,
    page: Option<usize>,
}

/// Split text at sentence boundaries (`.`, `!`, `?` followed by a space and
/// an uppercase letter, or end of string).
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let is_terminal = bytes[i] == b'.' || bytes[i] == b'!' || bytes[i] == b'?';
        if is_terminal {
            if i + 1 < bytes.len() && bytes[i + 1] == b' ' {
                let after_space = if i + 2 < bytes.len() { bytes[i + 2] } else { b'\n' };
                if after_space.is_ascii_uppercase() || after_space == b'\n' {
                    let end = i + 1;
                    let s = text[start..end].trim();
                    if !s.is_empty() {
                        sentences.push(s.to_string());
                    }
                    start = end + 1;
                    i = start;
                    continue;
                }
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Split `text` into chunks of at most `max_chars`, preferring sentence
/// boundaries, falling back to whitespace splitting for a single oversized
/// sentence.
fn split_to_fit(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    let mut pieces = Vec::new();
    let mut buf = String::new();
    for sentence in split_sentences(text) {
        if sentence.chars().count() > max_chars {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            let words: Vec<&str> = sentence.split_whitespace().collect();
            let mut word_buf = String::new();
            for word in words {
                let candidate_len = word_buf.chars().count() + 1 + word.chars().count();
                if !word_buf.is_empty() && candidate_len > max_chars {
                    pieces.push(std::mem::take(&mut word_buf));
                }
                if !word_buf.is_empty() {
                    word_buf.push(' ');
                }
                word_buf.push_str(word);
            }
            if !word_buf.is_empty() {
                pieces.push(word_buf);
            }
            continue;
        }
        let candidate_len = buf.chars().count() + 1 + sentence.chars().count();
        if !buf.is_empty() && candidate_len > max_chars {
            pieces.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(&sentence);
    }
    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Flatten a document's blocks into paragraph-sized pieces, splitting any
/// block that exceeds the hard cap by sentence, then by word.
fn flatten(doc: &ExtractedDocument) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for block in &doc.blocks {
        let text = block.text.trim();
        if text.is_empty() {
            continue;
        }
        for fragment in split_to_fit(text, HARD_MAX) {
            pieces.push(Piece {
                text: fragment,
                page: block.page,
            });
        }
    }
    pieces
}

/// Build chunks for `source_url` from an extracted document. Returns an
/// empty vec if the document's total text is below [`MIN_SOURCE_CHARS`].
pub fn chunk_document(doc: &ExtractedDocument, source_url: &str) -> Vec<Chunk> {
    if doc.total_chars() < MIN_SOURCE_CHARS {
        return Vec::new();
    }

    let pieces = flatten(doc);
    if pieces.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<(String, Option<usize>)> = Vec::new();
    let mut buf = String::new();
    let mut buf_page: Option<usize> = None;

    for piece in pieces {
        if buf.is_empty() {
            buf_page = piece.page;
        }
        let candidate_len = buf.chars().count() + if buf.is_empty() { 0 } else { 1 } + piece.text.chars().count();

        if !buf.is_empty() && candidate_len > TARGET_MAX && buf.chars().count() >= TARGET_MIN {
            chunks.push((std::mem::take(&mut buf), buf_page));
            buf_page = piece.page;
        } else if !buf.is_empty() && candidate_len > HARD_MAX {
            chunks.push((std::mem::take(&mut buf), buf_page));
            buf_page = piece.page;
        }

        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(&piece.text);
    }
    if !buf.is_empty() {
        chunks.push((buf, buf_page));
    }

    let mut byte_offset = 0usize;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, (text, page))| {
            let chunk = Chunk {
                chunk_id: format!("{}#{}", source_url, i),
                source_url: source_url.to_string(),
                order_index: i as u32,
                page_number: page.map(|p| p as u32),
                byte_offset: Some(byte_offset),
                text: text.clone(),
            };
            byte_offset += text.len() + 1;
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;

    fn doc_from(texts: &[&str]) -> ExtractedDocument {
        let blocks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Block {
                text: t.to_string(),
                page: None,
                position: i,
            })
            .collect();
        ExtractedDocument { blocks, page_count: 1 }
    }

    #[test]
    fn below_minimum_yields_zero_chunks() {
        let doc = doc_from(&["too short"]);
        let chunks = chunk_document(&doc, "https://example.com/a.txt");
        assert!(chunks.is_empty());
    }

    #[test]
    fn contiguous_join_reproduces_source_text() {
        let para = "Sentence one here. Sentence two follows. ".repeat(60);
        let doc = doc_from(&[para.as_str()]);
        let chunks = chunk_document(&doc, "https://example.com/b.txt");
        assert!(!chunks.is_empty());
        let joined: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&joined), normalize(&doc.joined_text()));
    }

    #[test]
    fn chunks_stay_within_hard_max() {
        let para = "word ".repeat(1000);
        let doc = doc_from(&[para.as_str()]);
        let chunks = chunk_document(&doc, "https://example.com/c.txt");
        for c in &chunks {
            assert!(c.text.chars().count() <= HARD_MAX);
        }
    }

    #[test]
    fn chunk_ids_and_order_indices_are_sequential() {
        let para = "word ".repeat(1000);
        let doc = doc_from(&[para.as_str()]);
        let chunks = chunk_document(&doc, "https://example.com/d.txt");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.order_index, i as u32);
            assert_eq!(c.chunk_id, format!("https://example.com/d.txt#{}", i));
        }
    }

    #[test]
    fn empty_document_yields_zero_chunks() {
        let doc = doc_from(&[""]);
        let chunks = chunk_document(&doc, "https://example.com/e.txt");
        assert!(chunks.is_empty());
    }
}
