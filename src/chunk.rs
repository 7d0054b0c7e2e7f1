//! Boundary-aware text chunker.
//!
//! Splits document body text into overlapping chunks bounded by a target
//! character size, preferring paragraph and sentence boundaries over
//! mid-sentence cuts. Chunk texts feed the vectorization pipeline; each
//! persisted chunk carries a SHA-256 hash of its text for staleness
//! detection.
//!
//! The chunker operates on characters, not bytes, so multi-byte input can
//! never be split inside a code point.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{chunk_id, Chunk};

/// Target maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Characters carried from the end of one chunk into the start of the next.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Deterministic, overlap-aware text segmenter.
///
/// Construction validates the configuration: `chunk_overlap >= chunk_size`
/// would stall the cursor, so it is rejected up front rather than failing
/// mid-run.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into an ordered sequence of chunk texts.
    ///
    /// Whitespace runs (including newlines) are collapsed to single spaces
    /// and the result trimmed before segmentation. Empty or whitespace-only
    /// input yields zero chunks; input at or under `chunk_size` yields
    /// exactly one. Longer input is cut at a paragraph break, else at a
    /// sentence break (`". "`, the period staying with its chunk), whenever
    /// the break lands past `chunk_size / 2`; otherwise at the size limit.
    /// Each chunk after the first re-includes the trailing `chunk_overlap`
    /// characters of its predecessor.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() <= self.chunk_size {
            return Ok(vec![normalized]);
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = usize::min(start + self.chunk_size, chars.len());

            if end < chars.len() {
                let window = &chars[start..end];
                // Normalized text cannot contain "\n\n", so the paragraph
                // scan never matches here; only the sentence scan can pull
                // the boundary in.
                match rfind_pair(window, ['\n', '\n']) {
                    Some(pos) if pos > self.chunk_size / 2 => {
                        end = start + pos;
                    }
                    _ => {
                        if let Some(pos) = rfind_pair(window, ['.', ' ']) {
                            if pos > self.chunk_size / 2 {
                                // The period stays with this chunk.
                                end = start + pos + 1;
                            }
                        }
                    }
                }
            }

            chunks.push(chars[start..end].iter().collect());

            if end >= chars.len() {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            if next <= start {
                return Err(Error::Configuration(format!(
                    "cursor stalled at {start}: chunk_overlap ({}) cancels out the \
                     boundary-adjusted chunk size",
                    self.chunk_overlap
                )));
            }
            start = next;
        }

        Ok(chunks)
    }
}

/// Collapse all whitespace runs to single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Index of the last occurrence of a two-character pattern in `window`.
fn rfind_pair(window: &[char], pair: [char; 2]) -> Option<usize> {
    if window.len() < 2 {
        return None;
    }
    (0..window.len() - 1)
        .rev()
        .find(|&i| window[i] == pair[0] && window[i + 1] == pair[1])
}

/// Build a persistable [`Chunk`] record for a chunk text at `index`.
pub fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("Hello, world!").unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_and_whitespace_only_yield_zero_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("   \n\t  \n").unwrap().is_empty());
    }

    #[test]
    fn test_exactly_chunk_size_is_single_chunk() {
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "a".repeat(20);
        let chunks = chunker.chunk(&text).unwrap();
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_normalization_collapses_runs_and_trims() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("  alpha \n\n beta\t\tgamma ").unwrap();
        assert_eq!(chunks, vec!["alpha beta gamma".to_string()]);
    }

    #[test]
    fn test_spec_example_two_chunks_with_five_char_overlap() {
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "AAAAAAAAAA BBBBBBBBBB CCCCCCCCCC"; // 32 chars normalized
        let chunks = chunker.chunk(text).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "AAAAAAAAAA BBBBBBBBB");
        assert_eq!(chunks[1], "BBBBBB CCCCCCCCCC");
        for c in &chunks {
            assert!(c.chars().count() <= 20);
        }

        let tail: String = chunks[0].chars().rev().take(5).collect::<Vec<_>>()
            .into_iter().rev().collect();
        let head: String = chunks[1].chars().take(5).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn test_sentence_boundary_pull_keeps_period() {
        let chunker = Chunker::new(20, 5).unwrap();
        // ". " lands at offset 14, past chunk_size / 2 = 10.
        let text = "AAAAAAAAAAAAAA. BBBBBBBBBBBBBBBB";
        let chunks = chunker.chunk(text).unwrap();

        assert_eq!(chunks[0], "AAAAAAAAAAAAAA.");
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn test_sentence_boundary_before_half_size_is_ignored() {
        let chunker = Chunker::new(20, 5).unwrap();
        // ". " at offset 4 is under chunk_size / 2, so the cut stays at 20.
        let text = "AAAA. BBBBBBBBBBBBBBBBBBBBBBBBBB";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks[0].chars().count(), 20);
    }

    #[test]
    fn test_paragraph_breaks_do_not_survive_normalization() {
        // The paragraph scan runs after whitespace normalization has already
        // collapsed every "\n\n", so a raw paragraph break past the half-size
        // gate must NOT become a cut point.
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "AAAAAAAAAAAAAA\n\nBBBBBBBBBBBBBBBB";
        let chunks = chunker.chunk(text).unwrap();

        assert_eq!(chunks[0], "AAAAAAAAAAAAAA BBBBB");
    }

    #[test]
    fn test_overlap_property_on_long_text() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = (0..40)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let overlap = 10.min(next.len());
            assert_eq!(
                &prev[prev.len() - overlap..],
                &next[..overlap],
                "junction must share the trailing overlap characters"
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let a = chunker.chunk(&text).unwrap();
        let b = chunker.chunk(&text).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "é".repeat(50);
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 20);
        }
    }

    #[test]
    fn test_invalid_configuration_rejected_at_construction() {
        assert!(matches!(
            Chunker::new(100, 100),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Chunker::new(100, 250),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(Chunker::new(0, 0), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_stalled_cursor_is_a_configuration_error() {
        // overlap 15 < size 20 passes construction, but a sentence pull to
        // offset 11 leaves end - overlap behind the cursor.
        let chunker = Chunker::new(20, 15).unwrap();
        let text = format!("AAAAAAAAAAA. {}", "B".repeat(30));
        assert!(matches!(
            chunker.chunk(&text),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_make_chunk_hash_and_id() {
        let a = make_chunk("doc1", 0, "same text");
        let b = make_chunk("doc1", 0, "same text");
        let c = make_chunk("doc1", 1, "other text");

        assert_eq!(a.id, "doc1-chunk-0");
        assert_eq!(c.id, "doc1-chunk-1");
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
    }
}
