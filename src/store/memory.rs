//! In-memory [`VectorStore`] implementation for tests.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over the rows of the requested organization.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{DocumentChunk, ScoredChunk};

use super::{check_lengths, top_k, DeleteOutcome, OrgStats, StoreError, StoreStats, VectorStore};

struct StoredRow {
    id: String,
    chunk: DocumentChunk,
    vector: Vec<f32>,
    created_at: i64,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    rows: RwLock<Vec<StoredRow>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored chunk, in insertion order.
    pub fn chunks(&self) -> Vec<DocumentChunk> {
        match self.rows.read() {
            Ok(rows) => rows.iter().map(|r| r.chunk.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredRow>>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredRow>>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_chunks(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<u64, StoreError> {
        check_lengths(chunks, vectors)?;
        let now = chrono::Utc::now().timestamp();
        let mut rows = self.write()?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            rows.push(StoredRow {
                id: uuid::Uuid::new_v4().to_string(),
                chunk: chunk.clone(),
                vector: vector.clone(),
                created_at: now,
            });
        }
        Ok(chunks.len() as u64)
    }

    async fn delete_by_source(&self, source: &str) -> Result<DeleteOutcome, StoreError> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|r| r.chunk.source != source);
        Ok(DeleteOutcome::from_count((before - rows.len()) as u64))
    }

    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        org_id: &str,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let rows = self.read()?;
        let hits = rows
            .iter()
            .filter(|r| r.chunk.org_id == org_id)
            .map(|r| ScoredChunk {
                id: r.id.clone(),
                text: r.chunk.text.clone(),
                source: r.chunk.source.clone(),
                file_path: r.chunk.file_path.clone(),
                scope: r.chunk.scope,
                org_id: r.chunk.org_id.clone(),
                page: r.chunk.page,
                score: cosine_similarity(query_vec, &r.vector) as f64,
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let rows = self.read()?;
        let mut per_org: BTreeMap<&str, (u64, HashSet<&str>, i64)> = BTreeMap::new();
        for r in rows.iter() {
            let entry = per_org
                .entry(r.chunk.org_id.as_str())
                .or_insert((0, HashSet::new(), i64::MIN));
            entry.0 += 1;
            entry.1.insert(r.chunk.source.as_str());
            entry.2 = entry.2.max(r.created_at);
        }
        Ok(StoreStats {
            total_chunks: rows.len() as u64,
            orgs: per_org
                .into_iter()
                .map(|(org, (chunks, sources, last))| OrgStats {
                    org_id: org.to_string(),
                    chunks,
                    sources: sources.len() as u64,
                    last_added: Some(last),
                })
                .collect(),
        })
    }
}
