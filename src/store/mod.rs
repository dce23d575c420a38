//! Storage abstraction for embedded chunks.
//!
//! The [`VectorStore`] trait is the only seam between ingestion/retrieval
//! and the database. Two backends exist: [`sqlite::SqliteVectorStore`] for
//! the CLI and server, and [`memory::InMemoryVectorStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{DocumentChunk, ScoredChunk};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("got {vectors} vectors for {chunks} chunks")]
    VectorCountMismatch { chunks: usize, vectors: usize },
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Result of deleting the chunks of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(u64),
    NothingToDelete,
}

impl DeleteOutcome {
    pub fn from_count(n: u64) -> Self {
        if n == 0 {
            DeleteOutcome::NothingToDelete
        } else {
            DeleteOutcome::Deleted(n)
        }
    }
}

/// Per-organization breakdown used by `kb stats` and the health endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrgStats {
    pub org_id: String,
    pub chunks: u64,
    pub sources: u64,
    /// Unix seconds of the newest chunk.
    pub last_added: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StoreStats {
    pub total_chunks: u64,
    pub orgs: Vec<OrgStats>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persists chunks with their embeddings. `vectors[i]` belongs to
    /// `chunks[i]`. Returns the number of rows written.
    async fn add_chunks(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<u64, StoreError>;

    /// Removes every chunk whose `source` equals the given file name.
    async fn delete_by_source(&self, source: &str) -> Result<DeleteOutcome, StoreError>;

    /// Top-`k` chunks by cosine similarity among those whose `org_id`
    /// matches exactly.
    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        org_id: &str,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

fn check_lengths(chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<(), StoreError> {
    if chunks.len() != vectors.len() {
        return Err(StoreError::VectorCountMismatch {
            chunks: chunks.len(),
            vectors: vectors.len(),
        });
    }
    Ok(())
}

/// Sorts by descending score and keeps the first `k`.
fn top_k(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_outcome_from_count() {
        assert_eq!(DeleteOutcome::from_count(0), DeleteOutcome::NothingToDelete);
        assert_eq!(DeleteOutcome::from_count(3), DeleteOutcome::Deleted(3));
    }
}
