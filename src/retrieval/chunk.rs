//! Chunk type and the windowing algorithm that turns normalized document
//! text into a sequence of [`DocumentChunk`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Regulator/doc-type/section/agent-focus metadata attached to a chunk, used
/// for equality/set-membership filtering at query time.
pub type ChunkMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: Uuid,
    pub document_id: String,
    pub ordinal: u32,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Splits `text` into windows of at most `max_chars` with at most
/// `overlap_chars` of overlap between consecutive windows, preferring to
/// break on the last sentence boundary (`.`, `!`, `?` followed by
/// whitespace) inside the window, falling back to a hard break at
/// `max_chars` when no such boundary exists.
///
/// Chunk ordering within a document is preserved by construction: windows are
/// produced left to right and numbered sequentially.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    assert!(overlap_chars < max_chars, "overlap must be smaller than window size");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + max_chars).min(chars.len());
        let break_at = if hard_end == chars.len() {
            hard_end
        } else {
            find_sentence_boundary(&chars, start, hard_end).unwrap_or(hard_end)
        };

        let window: String = chars[start..break_at].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if break_at >= chars.len() {
            break;
        }

        // Next window starts `overlap_chars` before this one ended, but never
        // goes backwards past the current start (guards against a
        // pathologically early sentence boundary stalling progress).
        let next_start = break_at.saturating_sub(overlap_chars);
        start = next_start.max(start + 1);
    }

    chunks
}

/// Scans backwards from `hard_end` within `[start, hard_end)` for the last
/// `.`/`!`/`?` immediately followed by whitespace or end-of-window, returning
/// the index just after that punctuation.
fn find_sentence_boundary(chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
    let mut i = hard_end;
    while i > start {
        i -= 1;
        let c = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let next_is_boundary = chars
                .get(i + 1)
                .map(|c| c.is_whitespace())
                .unwrap_or(true);
            if next_is_boundary && i + 1 > start {
                return Some(i + 1);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("A short sentence.", 1000, 200);
        assert_eq!(chunks, vec!["A short sentence."]);
    }

    #[test]
    fn respects_max_chars_hard_break_with_no_punctuation() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, 1000, 200);
        for c in &chunks {
            assert!(c.chars().count() <= 1000);
        }
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn prefers_sentence_boundary_break() {
        let mut text = "Sentence one is reasonably long indeed. ".repeat(20);
        text.push_str("Final sentence.");
        let chunks = chunk_text(&text, 200, 50);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.ends_with('.'));
        }
    }

    #[test]
    fn consecutive_windows_overlap_by_at_most_configured_amount() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() > 1);
    }
}
