//! SQLite-backed [`VectorStore`] implementation.
//!
//! Embeddings are stored as little-endian `f32` blobs next to the chunk text
//! and metadata. Search loads the rows of one organization and ranks them by
//! cosine similarity in process.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{DocumentChunk, Scope, ScoredChunk};

use super::{check_lengths, top_k, DeleteOutcome, OrgStats, StoreError, StoreStats, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_chunks(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<u64, StoreError> {
        check_lengths(chunks, vectors)?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, text, source, file_path, scope, org_id, page,
                                    embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&chunk.text)
            .bind(&chunk.source)
            .bind(&chunk.file_path)
            .bind(chunk.scope.as_str())
            .bind(&chunk.org_id)
            .bind(chunk.page as i64)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len() as u64)
    }

    async fn delete_by_source(&self, source: &str) -> Result<DeleteOutcome, StoreError> {
        let result = sqlx::query("DELETE FROM chunks WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(DeleteOutcome::from_count(result.rows_affected()))
    }

    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        org_id: &str,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, source, file_path, scope, org_id, page, embedding
            FROM chunks
            WHERE org_id = ?
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let scope: String = row.get("scope");
                let page: i64 = row.get("page");
                ScoredChunk {
                    id: row.get("id"),
                    text: row.get("text"),
                    source: row.get("source"),
                    file_path: row.get("file_path"),
                    scope: Scope::parse(&scope).unwrap_or(Scope::Org),
                    org_id: row.get("org_id"),
                    page: page as u32,
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        Ok(top_k(hits, k))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT org_id,
                   COUNT(*) AS chunks,
                   COUNT(DISTINCT source) AS sources,
                   MAX(created_at) AS last_added
            FROM chunks
            GROUP BY org_id
            ORDER BY org_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let orgs: Vec<OrgStats> = rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                let sources: i64 = row.get("sources");
                let last: Option<i64> = row.get("last_added");
                OrgStats {
                    org_id: row.get("org_id"),
                    chunks: chunks as u64,
                    sources: sources as u64,
                    last_added: last,
                }
            })
            .collect();

        Ok(StoreStats {
            total_chunks: orgs.iter().map(|o| o.chunks).sum(),
            orgs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteVectorStore {
        let mut config = Config::default();
        config.db.path = tmp.path().join("vector_store").join("chunks.sqlite");
        let pool = db::connect(&config).await.unwrap();
        migrate::create_schema(&pool).await.unwrap();
        SqliteVectorStore::new(pool)
    }

    fn chunk(text: &str, source: &str, org: &str, page: u32) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            source: source.to_string(),
            file_path: format!("/kb/{}", source),
            scope: if org == "GLOBAL" { Scope::Global } else { Scope::Org },
            org_id: org.to_string(),
            page,
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let written = store
            .add_chunks(&[chunk("hello", "a.pdf", "ACME", 3)], &[vec![0.6, 0.8]])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let hits = store.similarity_search(&[0.6, 0.8], 4, "ACME").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.text, "hello");
        assert_eq!(hit.source, "a.pdf");
        assert_eq!(hit.file_path, "/kb/a.pdf");
        assert_eq!(hit.scope, Scope::Org);
        assert_eq!(hit.page, 3);
        assert!((hit.score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn filter_excludes_more_similar_foreign_chunks() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .add_chunks(
                &[
                    chunk("exact match", "other.pdf", "OTHER", 1),
                    chunk("weak match", "acme.pdf", "ACME", 1),
                ],
                &[vec![1.0, 0.0], vec![0.1, 1.0]],
            )
            .await
            .unwrap();

        let hits = store.similarity_search(&[1.0, 0.0], 4, "ACME").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "weak match");
    }

    #[tokio::test]
    async fn delete_by_source_counts_rows() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .add_chunks(
                &[
                    chunk("one", "a.pdf", "ACME", 1),
                    chunk("two", "a.pdf", "ACME", 2),
                    chunk("three", "b.pdf", "ACME", 1),
                ],
                &[vec![1.0], vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();

        assert_eq!(
            store.delete_by_source("a.pdf").await.unwrap(),
            DeleteOutcome::Deleted(2)
        );
        assert_eq!(
            store.delete_by_source("missing.pdf").await.unwrap(),
            DeleteOutcome::NothingToDelete
        );
        assert_eq!(store.stats().await.unwrap().total_chunks, 1);
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, StoreStats::default());
    }
}
