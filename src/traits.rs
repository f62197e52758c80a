//! Capability traits at the ingestion seams.
//!
//! Network access is behind small traits so the pipeline can run against
//! in-memory fakes in tests:
//!
//! ```text
//!  PageFetcher      ──▶ ManualConnector       ──┐
//!                                               ├──▶ ingest_docs() ──▶ Index
//!  RecordPageSource ──▶ RequirementsConnector ──┘
//! ```
//!
//! [`Connector`] is the unit the ingestion orchestrator drives: one per
//! source branch, each producing normalized [`Record`]s.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::Record;

/// A source branch that yields normalized records.
///
/// `scan` either returns every record of the source or fails; partial
/// results are never returned, so a failure leaves the branch's cache
/// untouched.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short label used in logs (e.g. `"manual"`).
    fn name(&self) -> &str;
    async fn scan(&self) -> Result<Vec<Record>>;
}

/// Fetches a document by URL and returns its body as text.
///
/// Non-success responses are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// One page of a paginated record listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Continuation token; absent on the last page.
    #[serde(default)]
    pub offset: Option<String>,
}

/// A record as returned by the table API: an id plus free-form fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Paginated record listing. `offset` is the token from the previous page.
#[async_trait]
pub trait RecordPageSource: Send + Sync {
    async fn fetch_page(&self, offset: Option<&str>) -> Result<RecordPage>;
}

/// Connector for a branch with no configured source. Scanning fails.
pub struct Unconfigured {
    pub name: &'static str,
}

#[async_trait]
impl Connector for Unconfigured {
    fn name(&self) -> &str {
        self.name
    }

    async fn scan(&self) -> Result<Vec<Record>> {
        anyhow::bail!(
            "sources.{} is not configured, but its cache is empty",
            self.name
        )
    }
}
