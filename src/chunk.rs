//! Recursive character text splitter.
//!
//! Splits [`Record`] text into [`Chunk`]s bounded by `chunk_size`
//! characters, with up to `chunk_overlap` characters carried from the tail
//! of one chunk into the head of the next.
//!
//! The text is split on the first separator from `["\n\n", "\n", " ", ""]`
//! that occurs in it. Separators stay attached to the head of the piece that
//! follows them. Pieces shorter than the bound are merged greedily; a piece
//! at or above the bound is split again with the remaining separators. The
//! empty separator splits into single characters, so with the default list
//! every chunk fits the bound. Output chunks are whitespace-trimmed and
//! empty ones are dropped.
//!
//! Each chunk receives a random UUID, its global position in the ingestion
//! order, and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Record};

/// Separator priority: paragraph, line, word, character.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text into bounded, overlapping pieces. Lengths are in characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(chunk_size, chunk_overlap, DEFAULT_SEPARATORS)
    }

    pub fn with_separators(chunk_size: usize, chunk_overlap: usize, separators: &[&str]) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into chunk texts, in order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, &sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                // Indivisible: kept whole rather than truncated.
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily merge pieces up to the bound, keeping an overlap window.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(&window) {
                    out.push(doc);
                }
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    let (_, first_len) = window.remove(0);
                    total -= first_len;
                }
            }
            window.push((piece, len));
            total += len;
        }
        if let Some(doc) = join_window(&window) {
            out.push(doc);
        }
        out
    }
}

fn join_window(window: &[(&str, usize)]) -> Option<String> {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on `separator`, attaching each separator to the following piece.
/// The empty separator splits into characters. Empty pieces are dropped.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        pieces.push(&text[start..pos]);
        start = pos;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Chunk every record in order. Indices run across all records.
pub fn chunk_records(records: &[Record], config: &ChunkingConfig) -> Vec<Chunk> {
    let splitter = TextSplitter::from_config(config);
    let mut chunks = Vec::new();
    let mut index: i64 = 0;
    for record in records {
        for text in splitter.split_text(&record.text) {
            chunks.push(make_chunk(record, index, text));
            index += 1;
        }
    }
    chunks
}

fn make_chunk(record: &Record, index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text,
        hash,
        metadata: record.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn test_short_record_single_chunk() {
        let record = Record::new("ION supports SAML single sign-on.", "https://docs/sso", "SSO");
        let chunks = chunk_records(&[record.clone()], &cfg(500, 100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, record.text);
        assert_eq!(chunks[0].metadata, record.metadata);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let splitter = TextSplitter::new(500, 100);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n  ").is_empty());
    }

    #[test]
    fn test_word_split_without_overlap_room() {
        let splitter = TextSplitter::new(10, 3);
        assert_eq!(
            splitter.split_text("aaaa bbbb cccc dddd"),
            vec!["aaaa bbbb", "cccc dddd"]
        );
    }

    #[test]
    fn test_overlap_carries_tail() {
        let splitter = TextSplitter::new(10, 5);
        assert_eq!(
            splitter.split_text("aa bb cc dd ee"),
            vec!["aa bb cc", "cc dd ee"]
        );
    }

    #[test]
    fn test_paragraphs_preferred() {
        let splitter = TextSplitter::new(20, 0);
        let text = "First paragraph.\n\nSecond one here.\n\nThird.";
        assert_eq!(
            splitter.split_text(text),
            vec!["First paragraph.", "Second one here.", "Third."]
        );
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = TextSplitter::new(5, 0);
        assert_eq!(splitter.split_text("abcdefghij"), vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_indivisible_piece_kept_whole() {
        let splitter = TextSplitter::with_separators(5, 0, &["\n\n", "\n", " "]);
        assert_eq!(
            splitter.split_text("ab abcdefghij cd"),
            vec!["ab", "abcdefghij", "cd"]
        );
    }

    #[test]
    fn test_bound_respected() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(50, 10);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 50, "oversized chunk: {:?}", c);
        }
    }

    #[test]
    fn test_multibyte_counts_characters() {
        let splitter = TextSplitter::new(4, 0);
        assert_eq!(splitter.split_text("ééééé"), vec!["éééé", "é"]);
    }

    #[test]
    fn test_indices_run_across_records() {
        let records = vec![
            Record::new("aaaa bbbb cccc dddd", "https://a", "A"),
            Record::new("short", "", "B"),
        ];
        let chunks = chunk_records(&records, &cfg(10, 3));
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
        assert_eq!(chunks[1].metadata.source, "https://a");
        assert_eq!(chunks[2].metadata.title, "B");
    }

    #[test]
    fn test_hash_is_content_addressed() {
        let records = vec![
            Record::new("same text", "x", "X"),
            Record::new("same text", "y", "Y"),
        ];
        let chunks = chunk_records(&records, &cfg(500, 100));
        assert_eq!(chunks[0].hash, chunks[1].hash);
        assert_ne!(chunks[0].id, chunks[1].id);
        assert_eq!(chunks[0].hash.len(), 64);
    }
}
