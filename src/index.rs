//! The vector index handle shared by ingestion and the HTTP service.
//!
//! A [`VectorIndex`] pairs an [`Embedder`] with a [`VectorStore`]. Ingestion
//! is its only writer; the server only reads through [`VectorIndex::retrieve`].

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::models::{normalize_org_id, DocumentChunk, ScoredChunk};
use crate::store::{DeleteOutcome, SqliteVectorStore, StoreError, StoreStats, VectorStore};

#[derive(Clone)]
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Opens the SQLite store (creating it if missing) with the configured
    /// embedder. Used by ingestion.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        crate::migrate::create_schema(&pool).await?;
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::new(embedder, Arc::new(SqliteVectorStore::new(pool))))
    }

    /// Opens an already-initialised store. Used by read-only commands and
    /// the server, which must not create an empty database as a side effect.
    pub async fn open_existing(config: &Config) -> Result<Self> {
        let pool = db::connect_existing(config)
            .await
            .context("Failed to open vector store (run `kb init` or `kb ingest` first)")?;
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::new(embedder, Arc::new(SqliteVectorStore::new(pool))))
    }

    /// Embeds and persists chunks. Returns the number stored.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<u64> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .with_context(|| format!("Embedding failed ({})", self.embedder.model_name()))?;
        let stored = self.store.add_chunks(chunks, &vectors).await?;
        Ok(stored)
    }

    /// Deletes every chunk previously stored for the given file name.
    pub async fn delete_source(&self, source: &str) -> Result<DeleteOutcome, StoreError> {
        self.store.delete_by_source(source).await
    }

    /// Filtered similarity search with scores. `org_id` is normalized to
    /// upper case before matching.
    pub async fn search(&self, query: &str, org_id: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let org_id = normalize_org_id(org_id);
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self.store.similarity_search(&query_vec, k, &org_id).await?;
        Ok(hits)
    }

    /// Chunk texts most similar to `query` within one organization.
    ///
    /// Never fails: errors are logged and yield an empty context.
    pub async fn retrieve(&self, query: &str, org_id: &str, k: usize) -> Vec<String> {
        match self.search(query, org_id, k).await {
            Ok(hits) => hits.into_iter().map(|h| h.text).collect(),
            Err(e) => {
                tracing::warn!(org_id, error = %e, "retrieval failed");
                Vec::new()
            }
        }
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats().await
    }
}

/// Retrieval through an index that may have failed to open.
pub async fn retrieve_or_empty(
    index: Option<&VectorIndex>,
    query: &str,
    org_id: &str,
    k: usize,
) -> Vec<String> {
    match index {
        Some(index) => index.retrieve(query, org_id, k).await,
        None => {
            tracing::warn!(org_id, "vector store unavailable; returning empty context");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;
    use crate::models::Scope;
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;

    /// Embeds text as letter counts for `a`, `b` and `c`.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|l| t.chars().filter(|c| c == l).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn chunk(text: &str, org: &str) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            file_path: "/kb/doc.pdf".to_string(),
            scope: Scope::Org,
            org_id: org.to_string(),
            page: 1,
        }
    }

    #[tokio::test]
    async fn retrieve_normalizes_org_and_orders_by_similarity() {
        let index = VectorIndex::new(
            Arc::new(LetterEmbedder),
            Arc::new(InMemoryVectorStore::new()),
        );
        let stored = index
            .add_documents(&[chunk("aaa", "ACME"), chunk("bbb", "ACME"), chunk("aab", "ACME")])
            .await
            .unwrap();
        assert_eq!(stored, 3);

        let texts = index.retrieve("a", " acme ", 2).await;
        assert_eq!(texts, vec!["aaa", "aab"]);
    }

    #[tokio::test]
    async fn retrieve_swallows_embedding_errors() {
        let index = VectorIndex::new(
            Arc::new(DisabledEmbedder),
            Arc::new(InMemoryVectorStore::new()),
        );
        assert!(index.retrieve("anything", "ACME", 4).await.is_empty());
        assert!(index.search("anything", "ACME", 4).await.is_err());
    }

    #[tokio::test]
    async fn add_documents_propagates_embedding_errors() {
        let index = VectorIndex::new(
            Arc::new(DisabledEmbedder),
            Arc::new(InMemoryVectorStore::new()),
        );
        assert!(index.add_documents(&[chunk("a", "ACME")]).await.is_err());
        assert_eq!(index.add_documents(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_index_yields_empty_context() {
        assert!(retrieve_or_empty(None, "q", "ACME", 4).await.is_empty());
    }
}
