//! Ingestion orchestration.
//!
//! Coordinates the flow from raw sources to a usable index:
//!
//! ```text
//! manual cache empty?        ──yes──▶ ManualConnector.scan()       ──▶ write cache
//! requirements cache empty?  ──yes──▶ RequirementsConnector.scan() ──▶ write cache
//! either branch refreshed?   ──yes──▶ wipe index storage
//! read both caches (manual first) ──▶ chunk ──▶ build_or_open
//! ```
//!
//! A branch whose cache is non-empty is never re-fetched, and a non-empty
//! index storage is reopened as-is. `reparse` empties both caches first,
//! which forces a full refresh and rebuild.

use anyhow::{Context, Result};

use crate::cache;
use crate::chunk::chunk_records;
use crate::config::Config;
use crate::connector_manual::ManualConnector;
use crate::connector_requirements::{AirtableClient, RequirementsConnector};
use crate::embedding::{create_embedder, Embedder};
use crate::index::{build_or_open, clear_storage, storage_is_empty, Index};
use crate::phrase::LexiconTagger;
use crate::traits::{Connector, Unconfigured};

/// What an ingestion run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records fetched for the manual branch, when it ran.
    pub manual_refreshed: Option<usize>,
    /// Records fetched for the requirements branch, when it ran.
    pub requirements_refreshed: Option<usize>,
    pub storage_cleared: bool,
    pub records: usize,
    pub chunks: usize,
    /// False when an existing index was reopened.
    pub index_built: bool,
}

/// Build the two source connectors from configuration.
///
/// A missing source section yields a connector that fails only if its
/// branch actually has to run.
pub fn connectors_from_config(config: &Config) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
    let manual: Box<dyn Connector> = match &config.sources.manual {
        Some(m) => Box::new(ManualConnector::http(m.clone())?),
        None => Box::new(Unconfigured { name: "manual" }),
    };

    let requirements: Box<dyn Connector> = match &config.sources.requirements {
        Some(r) => Box::new(RequirementsConnector::new(
            Box::new(AirtableClient::new(r)?),
            Box::new(LexiconTagger::new()),
            config.product.name.clone(),
        )),
        None => Box::new(Unconfigured {
            name: "requirements",
        }),
    };

    Ok((manual, requirements))
}

/// Refresh empty caches, then build or reopen the index.
pub async fn ingest_docs(
    config: &Config,
    manual: &dyn Connector,
    requirements: &dyn Connector,
    embedder: &dyn Embedder,
) -> Result<(Index, IngestSummary)> {
    let paths = &config.paths;
    let mut summary = IngestSummary::default();

    let manual_empty = cache::is_empty(&paths.manual_cache);
    let requirements_empty = cache::is_empty(&paths.requirements_cache);

    if manual_empty {
        summary.manual_refreshed = Some(refresh(manual, &paths.manual_cache).await?);
    }
    if requirements_empty {
        summary.requirements_refreshed =
            Some(refresh(requirements, &paths.requirements_cache).await?);
    }
    if manual_empty || requirements_empty {
        clear_storage(&paths.index_dir)?;
        summary.storage_cleared = true;
    }

    let mut records = cache::read_records(&paths.manual_cache)?;
    records.extend(cache::read_records(&paths.requirements_cache)?);
    summary.records = records.len();

    let chunks = chunk_records(&records, &config.chunking);
    summary.chunks = chunks.len();
    summary.index_built = storage_is_empty(&paths.index_dir);

    tracing::info!(
        records = summary.records,
        chunks = summary.chunks,
        rebuild = summary.index_built,
        "records chunked"
    );

    let index = build_or_open(&chunks, config, embedder).await?;
    Ok((index, summary))
}

/// Empty both caches, then run [`ingest_docs`].
pub async fn reparse(
    config: &Config,
    manual: &dyn Connector,
    requirements: &dyn Connector,
    embedder: &dyn Embedder,
) -> Result<(Index, IngestSummary)> {
    cache::truncate(&config.paths.manual_cache)?;
    cache::truncate(&config.paths.requirements_cache)?;
    tracing::info!("caches truncated for reparse");
    ingest_docs(config, manual, requirements, embedder).await
}

async fn refresh(connector: &dyn Connector, cache_path: &std::path::Path) -> Result<usize> {
    tracing::info!(branch = connector.name(), "cache empty, fetching source");
    let records = connector
        .scan()
        .await
        .with_context(|| format!("{} source failed", connector.name()))?;
    cache::write_records(cache_path, &records)?;
    tracing::info!(
        branch = connector.name(),
        records = records.len(),
        cache = %cache_path.display(),
        "cache written"
    );
    Ok(records.len())
}

/// CLI entry point for `rfp ingest` and `rfp reparse`.
pub async fn run_ingest(config: &Config, force_reparse: bool) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let (manual, requirements) = connectors_from_config(config)?;

    let (index, summary) = if force_reparse {
        reparse(config, manual.as_ref(), requirements.as_ref(), embedder.as_ref()).await?
    } else {
        ingest_docs(config, manual.as_ref(), requirements.as_ref(), embedder.as_ref()).await?
    };

    let stored = index.chunk_count().await?;

    println!("{}", if force_reparse { "reparse" } else { "ingest" });
    if let Some(n) = summary.manual_refreshed {
        println!("  manual refreshed: {} records", n);
    }
    if let Some(n) = summary.requirements_refreshed {
        println!("  requirements refreshed: {} records", n);
    }
    if summary.storage_cleared {
        println!("  index storage cleared");
    }
    println!("  records: {}", summary.records);
    println!("  chunks: {}", summary.chunks);
    println!(
        "  index: {} ({} chunks stored in '{}')",
        if summary.index_built { "built" } else { "reopened" },
        stored,
        index.collection()
    );
    println!("ok");

    index.close().await;
    Ok(())
}
