//! Run-scoped chunk de-duplication and token estimates.
//!
//! The deduplicator lives for exactly one ingestion run and is shared by
//! every file processed in it, so a passage repeated across two PDFs is
//! stored once. Nothing is remembered between runs: unchanged files are
//! skipped by the manifest, not by this set.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::models::DocumentChunk;

/// Words-to-tokens ratio used for reporting.
const TOKENS_PER_WORD: f64 = 1.3;

/// Outcome of offering one chunk to the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Kept,
    Duplicate,
    Empty,
}

/// Chunks surviving de-duplication for one file, with per-file counters.
#[derive(Debug, Default)]
pub struct DedupBatch {
    pub unique: Vec<DocumentChunk>,
    pub duplicates: u64,
    pub tokens_est: u64,
}

#[derive(Debug, Default)]
pub struct ChunkDeduplicator {
    seen: HashSet<String>,
    duplicates: u64,
}

impl ChunkDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trims the chunk text in place and decides whether it is kept.
    pub fn admit(&mut self, chunk: &mut DocumentChunk) -> Admission {
        let trimmed = chunk.text.trim();
        if trimmed.is_empty() {
            return Admission::Empty;
        }
        if trimmed.len() != chunk.text.len() {
            chunk.text = trimmed.to_string();
        }

        if self.seen.insert(content_digest(&chunk.text)) {
            Admission::Kept
        } else {
            self.duplicates += 1;
            Admission::Duplicate
        }
    }

    /// Filters one file's chunks, accumulating the run-wide duplicate count.
    pub fn filter(&mut self, chunks: Vec<DocumentChunk>) -> DedupBatch {
        let mut batch = DedupBatch::default();
        for mut chunk in chunks {
            match self.admit(&mut chunk) {
                Admission::Kept => {
                    batch.tokens_est += estimate_tokens(&chunk.text);
                    batch.unique.push(chunk);
                }
                Admission::Duplicate => batch.duplicates += 1,
                Admission::Empty => {}
            }
        }
        batch
    }

    /// Duplicates rejected so far in this run.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// SHA-256 hex digest of a chunk's normalized text.
pub fn content_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// `floor(whitespace-separated words × 1.3)`.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;

    fn chunk(text: &str, source: &str) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            source: source.to_string(),
            file_path: format!("/kb/{}", source),
            scope: Scope::Global,
            org_id: "GLOBAL".to_string(),
            page: 1,
        }
    }

    #[test]
    fn token_estimate_rounds_down() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one"), 1);
        assert_eq!(estimate_tokens("one two three"), 3);
        assert_eq!(estimate_tokens("a b c d e f g h i j"), 13);
        assert_eq!(estimate_tokens("  spaced \n\t words  "), 2);
    }

    #[test]
    fn empty_chunks_are_not_duplicates() {
        let mut d = ChunkDeduplicator::new();
        assert_eq!(d.admit(&mut chunk("   ", "a.pdf")), Admission::Empty);
        assert_eq!(d.admit(&mut chunk("\n", "a.pdf")), Admission::Empty);
        assert_eq!(d.duplicates(), 0);
        assert_eq!(d.seen(), 0);
    }

    #[test]
    fn trimmed_text_is_the_identity() {
        let mut d = ChunkDeduplicator::new();
        let mut first = chunk("  same text \n", "a.pdf");
        assert_eq!(d.admit(&mut first), Admission::Kept);
        assert_eq!(first.text, "same text");
        assert_eq!(d.admit(&mut chunk("same text", "b.pdf")), Admission::Duplicate);
        assert_eq!(d.duplicates(), 1);
    }

    #[test]
    fn duplicates_counted_across_files() {
        let mut d = ChunkDeduplicator::new();
        let a = d.filter(vec![
            chunk("alpha", "a.pdf"),
            chunk("beta", "a.pdf"),
            chunk("alpha", "a.pdf"),
        ]);
        assert_eq!(a.unique.len(), 2);
        assert_eq!(a.duplicates, 1);

        let b = d.filter(vec![
            chunk("alpha", "b.pdf"),
            chunk("beta", "b.pdf"),
            chunk("gamma delta", "b.pdf"),
        ]);
        assert_eq!(b.unique.len(), 1);
        assert_eq!(b.unique[0].text, "gamma delta");
        assert_eq!(b.duplicates, 2);
        assert_eq!(b.tokens_est, 2);
        assert_eq!(d.duplicates(), 3);
    }
}
