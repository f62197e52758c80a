//! # RFP Compliance
//!
//! Retrieval-augmented yes/no compliance checking of RFP requirements
//! against a product manual and a structured requirements table.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Manual crawl │──▶│ JSON caches │──▶│ Chunk+Embed  │──▶ SQLite index
//! │ Requirements │   │ (per source)│   │              │
//! └──────────────┘   └─────────────┘   └──────────────┘
//!                                             │
//!          prompt ──▶ MMR retrieval ──▶ LLM ──▶ verdict ──▶ score
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Records, chunks, answers |
//! | [`traits`] | Connector and page-source traits |
//! | [`connector_manual`] | Documentation-site crawler |
//! | [`connector_requirements`] | Requirements-table client |
//! | [`extract`] | Sitemap and HTML text extraction |
//! | [`phrase`] | Requirement phrasing and prompt rewriting |
//! | [`cache`] | JSON cache artifacts |
//! | [`chunk`] | Recursive text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Index schema |
//! | [`index`] | Persistent vector index |
//! | [`search`] | MMR retrieval |
//! | [`llm`] | Language-model provider abstraction |
//! | [`qa`] | Retrieval QA |
//! | [`verdict`] | Verdict extraction and scoring |
//! | [`ingest`] | Ingestion orchestration |
//! | [`evaluate`] | Batch evaluation |
//! | [`history`] | Response and history CSV files |
//! | [`progress`] | Batch progress reporting |
//! | [`stats`] | Index statistics |
//! | [`sources`] | Input status |
//! | [`logging`] | Tracing subscriber setup |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod connector_manual;
pub mod connector_requirements;
pub mod db;
pub mod embedding;
pub mod evaluate;
pub mod extract;
pub mod history;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod phrase;
pub mod progress;
pub mod qa;
pub mod search;
pub mod sources;
pub mod stats;
pub mod traits;
pub mod verdict;
