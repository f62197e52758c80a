//! Requirements-table connector.
//!
//! Pulls every row of an Airtable-style table and turns each requirement
//! into a phrased statement about the product (see [`crate::phrase`]).
//!
//! # Configuration
//!
//! ```toml
//! [sources.requirements]
//! endpoint = "https://api.airtable.com/v0/appXXXX/Requirements?view=Grid%20view"
//! token_env = "AT_TOKEN"
//! ```
//!
//! # Protocol
//!
//! `GET {endpoint}` with `Authorization: Bearer <token>`, plus an `offset`
//! query parameter after the first page. Each response is
//! `{ "records": [{ "id", "fields" }], "offset"? }`; the loop stops on the
//! first page without `offset`.
//!
//! # Row handling
//!
//! - `fields.Requirement` missing or null: row skipped.
//! - `fields.Requirement` not a string: row skipped with a warning.
//! - `fields["Opt In"]` present and non-null: the product opts in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::RequirementsSourceConfig;
use crate::models::{Record, REQUIREMENTS_TITLE};
use crate::phrase::{phrase, PosTagger};
use crate::traits::{Connector, RawRecord, RecordPage, RecordPageSource};

const REQUIREMENT_FIELD: &str = "Requirement";
const OPT_IN_FIELD: &str = "Opt In";

/// HTTP client for the table API.
///
/// The bearer token is read from the configured environment variable on
/// every page request, so a missing token only fails when the branch runs.
pub struct AirtableClient {
    endpoint: String,
    token_env: String,
    client: reqwest::Client,
}

impl AirtableClient {
    pub fn new(config: &RequirementsSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            token_env: config.token_env.clone(),
            client,
        })
    }
}

#[async_trait]
impl RecordPageSource for AirtableClient {
    async fn fetch_page(&self, offset: Option<&str>) -> Result<RecordPage> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("{} environment variable not set", self.token_env))?;

        let mut req = self.client.get(&self.endpoint).bearer_auth(token);
        if let Some(offset) = offset {
            req = req.query(&[("offset", offset)]);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach requirements table at {}", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Requirements table returned {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let page: RecordPage = resp
            .json()
            .await
            .context("Malformed requirements table response")?;
        Ok(page)
    }
}

/// Fetch pages until the source stops returning an offset.
pub async fn fetch_all_records(source: &dyn RecordPageSource) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    let mut offset: Option<String> = None;

    loop {
        let page = source.fetch_page(offset.as_deref()).await?;
        records.extend(page.records);
        tracing::debug!(total = records.len(), "requirements page fetched");

        match page.offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }

    Ok(records)
}

/// Phrase every usable row into a record, preserving row order.
pub fn phrase_records(rows: &[RawRecord], tagger: &dyn PosTagger, product: &str) -> Vec<Record> {
    let mut out = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let requirement = match row.fields.get(REQUIREMENT_FIELD) {
            None | Some(serde_json::Value::Null) => {
                skipped += 1;
                continue;
            }
            Some(serde_json::Value::String(s)) => s,
            Some(other) => {
                tracing::warn!(id = %row.id, value = %other, "non-text requirement skipped");
                skipped += 1;
                continue;
            }
        };

        let opted_in = !matches!(
            row.fields.get(OPT_IN_FIELD),
            None | Some(serde_json::Value::Null)
        );
        let text = phrase(tagger, product, requirement, opted_in);
        out.push(Record::new(text, "", REQUIREMENTS_TITLE));
    }

    tracing::info!(rows = rows.len(), phrased = out.len(), skipped, "requirements phrased");
    out
}

/// The requirements branch.
pub struct RequirementsConnector {
    source: Box<dyn RecordPageSource>,
    tagger: Box<dyn PosTagger>,
    product: String,
}

impl RequirementsConnector {
    pub fn new(
        source: Box<dyn RecordPageSource>,
        tagger: Box<dyn PosTagger>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            source,
            tagger,
            product: product.into(),
        }
    }
}

#[async_trait]
impl Connector for RequirementsConnector {
    fn name(&self) -> &str {
        "requirements"
    }

    async fn scan(&self) -> Result<Vec<Record>> {
        let rows = fetch_all_records(self.source.as_ref()).await?;
        Ok(phrase_records(&rows, self.tagger.as_ref(), &self.product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::LexiconTagger;
    use std::sync::Mutex;

    /// Serves canned pages keyed by the offset that requests them.
    struct PagedSource {
        pages: Vec<(Option<&'static str>, &'static str)>,
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl RecordPageSource for PagedSource {
        async fn fetch_page(&self, offset: Option<&str>) -> Result<RecordPage> {
            self.seen.lock().unwrap().push(offset.map(String::from));
            let (_, body) = self
                .pages
                .iter()
                .find(|(o, _)| *o == offset)
                .ok_or_else(|| anyhow::anyhow!("unexpected offset {:?}", offset))?;
            Ok(serde_json::from_str(body)?)
        }
    }

    fn source() -> PagedSource {
        PagedSource {
            pages: vec![
                (
                    None,
                    r#"{"records":[
                        {"id":"r1","fields":{"Requirement":"Export audit trail to CSV","Opt In":true}},
                        {"id":"r2","fields":{"Notes":"no requirement"}}
                    ],"offset":"itr1/r2"}"#,
                ),
                (
                    Some("itr1/r2"),
                    r#"{"records":[
                        {"id":"r3","fields":{"Requirement":"Electronic signatures","Opt In":null}},
                        {"id":"r4","fields":{"Requirement":42}},
                        {"id":"r5","fields":{"Requirement":"Dashboard for open work orders","Opt In":"Yes"}}
                    ]}"#,
                ),
            ],
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn accumulates_pages_until_offset_absent() {
        let src = source();
        let rows = fetch_all_records(&src).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            src.seen.lock().unwrap().as_slice(),
            &[None, Some("itr1/r2".to_string())]
        );
    }

    #[tokio::test]
    async fn scan_phrases_usable_rows() {
        let connector =
            RequirementsConnector::new(Box::new(source()), Box::new(LexiconTagger::new()), "ION");
        let records = connector.scan().await.unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "ION does Export audit trail to CSV",
                "ION does not have Electronic signatures",
                "ION provides Dashboard for open work orders",
            ]
        );
        for r in &records {
            assert_eq!(r.metadata.source, "");
            assert_eq!(r.metadata.title, "Airtable data");
        }
    }

    #[tokio::test]
    async fn page_failure_propagates() {
        let src = PagedSource {
            pages: vec![(None, r#"{"records":[],"offset":"missing"}"#)],
            seen: Mutex::new(Vec::new()),
        };
        assert!(fetch_all_records(&src).await.is_err());
    }
}
