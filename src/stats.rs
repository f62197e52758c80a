//! Index statistics.
//!
//! A quick summary of what the persisted index holds: storage size, the
//! collection's embedding model and dimensionality, chunk counts, and a
//! per-source breakdown. Used by `rfp stats`.

use anyhow::Result;
use sqlx::Row;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::{storage_is_empty, Index};

/// Embedding metadata recorded when the collection was built.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub model: String,
    pub dims: i64,
    pub created_at: i64,
}

/// Chunk count for one source identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub title: String,
    pub chunk_count: i64,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub collection: String,
    pub info: Option<CollectionInfo>,
    pub chunk_count: i64,
    pub by_source: Vec<SourceStats>,
}

/// Query the opened index for its statistics.
pub async fn collect_stats(index: &Index) -> Result<IndexStats> {
    let info = sqlx::query("SELECT model, dims, created_at FROM collections WHERE name = ?")
        .bind(index.collection())
        .fetch_optional(index.pool())
        .await?
        .map(|row| CollectionInfo {
            model: row.get("model"),
            dims: row.get("dims"),
            created_at: row.get("created_at"),
        });

    let chunk_count = index.chunk_count().await?;

    let rows = sqlx::query(
        r#"
        SELECT source, MIN(title) AS title, COUNT(*) AS chunk_count
        FROM chunks
        WHERE collection = ?
        GROUP BY source
        ORDER BY chunk_count DESC, source
        "#,
    )
    .bind(index.collection())
    .fetch_all(index.pool())
    .await?;

    let by_source = rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            title: row.get("title"),
            chunk_count: row.get("chunk_count"),
        })
        .collect();

    Ok(IndexStats {
        collection: index.collection().to_string(),
        info,
        chunk_count,
        by_source,
    })
}

/// Run the stats command and print a summary.
///
/// An empty storage directory is reported without opening it, so the
/// command never creates an index file as a side effect.
pub async fn run_stats(config: &Config) -> Result<()> {
    let dir = &config.paths.index_dir;

    println!("RFP Compliance: Index Stats");
    println!("===========================");
    println!();
    println!("  Storage:     {}", dir.display());

    if storage_is_empty(dir) {
        println!("  State:       empty (next ingest builds the index)");
        println!();
        return Ok(());
    }

    let index = Index::open(dir, &config.index.collection).await?;
    let result = collect_stats(&index).await;
    index.close().await;
    let stats = result?;

    println!("  Size:        {}", format_bytes(dir_size(dir)));
    println!("  Collection:  {}", stats.collection);
    match &stats.info {
        Some(info) => {
            println!("  Model:       {} ({} dims)", info.model, info.dims);
            println!("  Built:       {}", format_ts_iso(info.created_at));
        }
        None => println!("  Model:       unknown (collection not found)"),
    }
    println!("  Chunks:      {}", stats.chunk_count);

    if !stats.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<56} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(65));
        for s in &stats.by_source {
            let label = if s.source.is_empty() {
                format!("({})", s.title)
            } else {
                s.source.clone()
            };
            println!("  {:<56} {:>8}", label, s.chunk_count);
        }
    }

    println!();
    Ok(())
}

/// Total size of every file under `dir`.
fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
