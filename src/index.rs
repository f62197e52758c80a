//! Persistent vector index.
//!
//! The index is one SQLite file under the configured storage directory,
//! holding every chunk with its embedding, bound to a collection name.
//!
//! Lifecycle is create-once, reuse-many:
//!
//! - storage directory missing or empty → embed every chunk and persist a
//!   fresh index;
//! - storage directory holds anything → open the existing store as-is. The
//!   chunks passed in are ignored and nothing is re-embedded.
//!
//! Fresh content therefore requires [`clear_storage`] first. A store built
//! under a different collection name or embedding dimensionality is not
//! detected: queries against it return whatever matches the collection
//! name, possibly nothing.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_batched, vec_to_blob, Embedder};
use crate::migrate;
use crate::models::{Chunk, RecordMetadata};

/// An opened index bound to one collection.
pub struct Index {
    pool: SqlitePool,
    collection: String,
}

/// A stored chunk with its embedding and its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub score: f32,
}

/// True when the storage directory is missing or has no entries.
pub fn storage_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Remove everything inside the storage directory, keeping the directory.
///
/// Walks bottom-up so files go before the directories that held them.
pub fn clear_storage(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        } else {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    tracing::info!(dir = %dir.display(), "cleared index storage");
    Ok(())
}

/// Build a fresh index from `chunks` when storage is empty; otherwise open
/// the existing one and ignore `chunks`.
pub async fn build_or_open(
    chunks: &[Chunk],
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<Index> {
    let dir = &config.paths.index_dir;
    let collection = &config.index.collection;

    if !storage_is_empty(dir) {
        tracing::info!(
            dir = %dir.display(),
            collection = %collection,
            ignored_chunks = chunks.len(),
            "reopening existing index; new chunks are not added"
        );
        return Index::open(dir, collection).await;
    }

    tracing::info!(
        dir = %dir.display(),
        collection = %collection,
        chunks = chunks.len(),
        model = embedder.model_name(),
        "building index"
    );

    // Embed before touching storage so a provider failure leaves it empty.
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_batched(embedder, &texts, config.embedding.batch_size).await?;

    match persist(dir, collection, embedder, chunks, &vectors).await {
        Ok(index) => Ok(index),
        Err(e) => {
            if let Err(clear_err) = clear_storage(dir) {
                tracing::warn!(error = %clear_err, "failed to clean up partial index");
            }
            Err(e)
        }
    }
}

async fn persist(
    dir: &Path,
    collection: &str,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<Index> {
    let pool = db::connect(dir).await?;
    migrate::run_migrations(&pool).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)")
        .bind(collection)
        .bind(embedder.model_name())
        .bind(embedder.dims() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

    for (chunk, vector) in chunks.iter().zip(vectors) {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, collection, chunk_index, text, source, title, hash, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(collection)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.metadata.source)
        .bind(&chunk.metadata.title)
        .bind(&chunk.hash)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Index {
        pool,
        collection: collection.to_string(),
    })
}

impl Index {
    /// Open an existing store and bind it to `collection`.
    pub async fn open(dir: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(dir).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// The `fetch_k` chunks most similar to `query`, best first.
    ///
    /// Ties keep ingestion order.
    pub async fn candidates(&self, query: &[f32], fetch_k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, chunk_index, text, source, title, hash, embedding
            FROM chunks
            WHERE collection = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                let score = cosine_similarity(query, &embedding);
                ScoredChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                        metadata: RecordMetadata {
                            source: row.get("source"),
                            title: row.get("title"),
                        },
                    },
                    embedding,
                    score,
                }
            })
            .collect();

        // Stable sort keeps chunk_index order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(fetch_k);
        Ok(scored)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(storage_is_empty(&tmp.path().join("nope")));
        assert!(storage_is_empty(tmp.path()));
    }

    #[test]
    fn clear_removes_nested_contents_keeps_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        std::fs::create_dir_all(dir.join("a").join("b")).unwrap();
        std::fs::write(dir.join("a").join("b").join("x.bin"), b"x").unwrap();
        std::fs::write(dir.join("top.sqlite3"), b"y").unwrap();
        assert!(!storage_is_empty(&dir));

        clear_storage(&dir).unwrap();
        assert!(dir.exists());
        assert!(storage_is_empty(&dir));
    }

    #[test]
    fn clear_missing_dir_is_ok() {
        let tmp = TempDir::new().unwrap();
        clear_storage(&tmp.path().join("absent")).unwrap();
    }
}
