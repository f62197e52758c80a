//! Core data models used throughout the pipeline.
//!
//! These types represent the records, chunks and answers that flow through
//! ingestion and retrieval. [`Record`] serializes to the cache-artifact shape
//! (`page_content` + `metadata`) so cache files stay readable by any tool
//! that produced them before.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Title carried by every record derived from the requirements table.
pub const REQUIREMENTS_TITLE: &str = "Airtable data";

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Canonical page URL for manual pages; empty for requirement rows.
    pub source: String,
    pub title: String,
}

/// A normalized text unit, before chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "page_content")]
    pub text: String,
    pub metadata: RecordMetadata,
}

impl Record {
    pub fn new(text: impl Into<String>, source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: RecordMetadata {
                source: source.into(),
                title: title.into(),
            },
        }
    }
}

/// A bounded slice of a record's text: the unit that is embedded and indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Position in the ingestion order (all records, all chunks).
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: RecordMetadata,
}

/// Result of one retrieval-augmented question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The prompt as it was asked.
    pub query: String,
    /// The model's response, verbatim.
    pub result: String,
    /// Every chunk placed into the prompt context, in retrieval order.
    pub source_documents: Vec<Chunk>,
}

impl Answer {
    /// Distinct source identifiers of the retrieved chunks, sorted.
    pub fn sources(&self) -> BTreeSet<String> {
        self.source_documents
            .iter()
            .map(|c| c.metadata.source.clone())
            .collect()
    }
}
