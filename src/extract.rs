//! PDF text extraction.
//!
//! Produces one text block per page so chunks can carry the page they came
//! from. Extraction never panics into the caller: a malformed PDF that trips
//! the parser is reported as [`ExtractError::Pdf`] and the ingest loop moves on
//! to the next file.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Text of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
}

/// Reads a PDF from disk and extracts its text page by page.
pub fn load_pdf(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    extract_pages(&bytes)
}

/// Extracts page texts from in-memory PDF bytes.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            page: i as u32 + 1,
            text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn missing_file_returns_io_error() {
        let err = load_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
