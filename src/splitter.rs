//! Recursive character splitter.
//!
//! Splits page text into windows of at most `chunk_size` characters that
//! share up to `chunk_overlap` characters with their predecessor. The text is
//! cut on the coarsest separator present (`"\n\n"`, then `"\n"`, then `" "`,
//! then between characters); pieces that are still too large are split again
//! with the next separator. Separators stay attached to the start of the
//! piece that follows them, so joining pieces reproduces the source text.
//!
//! Lengths are counted in `char`s, not bytes.

use anyhow::{bail, Result};
use std::collections::VecDeque;

use crate::extract::PageText;
use crate::models::{DiscoveredFile, DocumentChunk};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splits text into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    /// Splits every page of a file and tags each window with the file's
    /// provenance. `file_path` is the absolute path recorded on the chunks.
    pub fn split_document(
        &self,
        file: &DiscoveredFile,
        file_path: &str,
        pages: &[PageText],
    ) -> Vec<DocumentChunk> {
        let source = file.file_name();
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                chunks.push(DocumentChunk {
                    text,
                    source: source.clone(),
                    file_path: file_path.to_string(),
                    scope: file.scope,
                    org_id: file.org_id.clone(),
                    page: page.page,
                });
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
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

        let mut out = Vec::new();
        let mut good: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge_splits(&good));
                good.clear();
            }
            if remaining.is_empty() {
                if let Some(doc) = trimmed(piece) {
                    out.push(doc);
                }
            } else {
                out.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good.is_empty() {
            out.extend(self.merge_splits(&good));
        }
        out
    }

    /// Greedily packs small pieces into windows, carrying the trailing
    /// pieces (up to `chunk_overlap` characters) into the next window.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join(&current) {
                    docs.push(doc);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(first) => total -= char_len(first),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Splits on `sep`, keeping each separator at the start of the following
/// piece. An empty separator splits between characters. Empty pieces are
/// dropped.
fn split_keep_separator<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    trimmed(&joined)
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use std::path::PathBuf;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:02}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn small_text_single_chunk() {
        let s = TextSplitter::new(1000, 100).unwrap();
        assert_eq!(s.split_text("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let s = TextSplitter::new(1000, 100).unwrap();
        assert!(s.split_text("  \n\n \n ").is_empty());
        assert!(s.split_text("").is_empty());
    }

    #[test]
    fn paragraphs_are_kept_together_when_they_fit() {
        let s = TextSplitter::new(1000, 100).unwrap();
        let chunks = s.split_text("para one.\n\npara two.");
        assert_eq!(chunks, vec!["para one.\n\npara two."]);
    }

    #[test]
    fn windows_respect_size_and_overlap() {
        let s = TextSplitter::new(20, 8).unwrap();
        let chunks = s.split_text(&words(30));

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0], "w00 w01 w02 w03 w04");
        assert!(chunks[1].starts_with("w03 w04"));
        for c in &chunks {
            assert!(c.chars().count() <= 20, "chunk too long: {:?}", c);
        }
        // Each window shares its trailing word with the next one.
        for pair in chunks.windows(2) {
            let last = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last));
        }
        assert!(chunks.last().unwrap().ends_with("w29"));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let s = TextSplitter::new(20, 5).unwrap();
        let text: String = ('a'..='z').chain('A'..='X').collect(); // 50 chars
        let chunks = s.split_text(&text);
        assert_eq!(
            chunks,
            vec![
                text[0..20].to_string(),
                text[15..35].to_string(),
                text[30..50].to_string(),
            ]
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let s = TextSplitter::new(10, 2).unwrap();
        let text = "ñññññ ééééé";
        let chunks = s.split_text(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat().replace(' ', ""), "ñññññééééé");
    }

    #[test]
    fn split_keep_separator_attaches_to_following_piece() {
        assert_eq!(
            split_keep_separator("a\n\nb\n\n\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\n", "\n\nc"]
        );
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn document_chunks_carry_provenance() {
        let s = TextSplitter::new(1000, 100).unwrap();
        let file = DiscoveredFile::org(PathBuf::from("documents/acme/plan.pdf"), "acme");
        let pages = vec![
            PageText {
                page: 1,
                text: "First page.".to_string(),
            },
            PageText {
                page: 2,
                text: "   ".to_string(),
            },
            PageText {
                page: 3,
                text: "Third page.".to_string(),
            },
        ];
        let chunks = s.split_document(&file, "/abs/documents/acme/plan.pdf", &pages);
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert_eq!(c.source, "plan.pdf");
            assert_eq!(c.file_path, "/abs/documents/acme/plan.pdf");
            assert_eq!(c.scope, Scope::Org);
            assert_eq!(c.org_id, "ACME");
        }
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 3);
    }
}
