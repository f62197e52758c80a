//! TOML configuration.
//!
//! Every path, source endpoint, chunking bound and provider setting used by
//! the pipeline is read from one file (default `./config/rfp.toml`). Secrets
//! are never stored here: provider keys and the requirements token are read
//! from the environment by the components that need them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub product: ProductConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProductConfig {
    /// Subject of every phrased requirement and every question.
    #[serde(default = "default_product_name")]
    pub name: String,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            name: default_product_name(),
        }
    }
}

fn default_product_name() -> String {
    "ION".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_manual_cache")]
    pub manual_cache: PathBuf,
    #[serde(default = "default_requirements_cache")]
    pub requirements_cache: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    #[serde(default = "default_responses_dir")]
    pub responses_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            manual_cache: default_manual_cache(),
            requirements_cache: default_requirements_cache(),
            index_dir: default_index_dir(),
            responses_dir: default_responses_dir(),
        }
    }
}

fn default_manual_cache() -> PathBuf {
    PathBuf::from("ION-manual/manual.json")
}
fn default_requirements_cache() -> PathBuf {
    PathBuf::from("Airtable_data/airtable.json")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("chroma_persist")
}
fn default_responses_dir() -> PathBuf {
    PathBuf::from("responses")
}

impl PathsConfig {
    /// Cumulative CSV of every processed prompt across sessions.
    pub fn history_file(&self) -> PathBuf {
        self.responses_dir.join(HISTORY_FILE_NAME)
    }
}

pub const HISTORY_FILE_NAME: &str = "history.csv";

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "ion-manual".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters carried from the tail of one chunk into the next.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks handed to the language model per prompt.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Nearest candidates considered by the diversity re-ranking.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// `1.0` = pure relevance, `0.0` = pure diversity.
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda_mult: default_lambda_mult(),
        }
    }
}

fn default_k() -> usize {
    6
}
fn default_fetch_k() -> usize {
    20
}
fn default_lambda_mult() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub manual: Option<ManualSourceConfig>,
    pub requirements: Option<RequirementsSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ManualSourceConfig {
    pub base_url: String,
    /// Crawl every page listed in the sitemap instead of the base page only.
    #[serde(default = "default_true")]
    pub load_all_paths: bool,
    /// URL path globs that are never loaded.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequirementsSourceConfig {
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_source_timeout_secs() -> u64 {
    30
}
fn default_token_env() -> String {
    "AT_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: Some("text-embedding-ada-002".to_string()),
            dims: Some(1536),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            url: None,
            max_retries: default_llm_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EvaluationConfig {
    /// Rewrite each prompt from its leading word before asking.
    #[serde(default)]
    pub rewrite_prompts: bool,
}

const PROVIDERS: &[&str] = &["openai", "ollama"];

impl Config {
    /// Configuration with every default applied and no sources configured.
    ///
    /// Used by commands that only need paths and the product name when no
    /// config file exists.
    pub fn minimal() -> Self {
        Self {
            product: ProductConfig::default(),
            paths: PathsConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            sources: SourcesConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.product.name.trim().is_empty() {
        anyhow::bail!("product.name must not be empty");
    }

    if config.index.collection.trim().is_empty() {
        anyhow::bail!("index.collection must not be empty");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.fetch_k < config.retrieval.k {
        anyhow::bail!("retrieval.fetch_k must be >= retrieval.k");
    }
    if !(0.0..=1.0).contains(&config.retrieval.lambda_mult) {
        anyhow::bail!("retrieval.lambda_mult must be in [0.0, 1.0]");
    }

    // Validate embedding
    if !PROVIDERS.contains(&config.embedding.provider.as_str()) {
        anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            config.embedding.provider
        );
    }
    if config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    if !PROVIDERS.contains(&config.llm.provider.as_str()) {
        anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            config.llm.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.product.name, "ION");
        assert_eq!(cfg.index.collection, "ion-manual");
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.chunk_overlap, 100);
        assert_eq!(cfg.retrieval.k, 6);
        assert_eq!(cfg.retrieval.fetch_k, 20);
        assert_eq!(cfg.paths.index_dir, PathBuf::from("chroma_persist"));
        assert_eq!(
            cfg.paths.history_file(),
            PathBuf::from("responses").join("history.csv")
        );
        assert!(cfg.sources.manual.is_none());
        assert!(!cfg.evaluation.rewrite_prompts);
    }

    #[test]
    fn sources_parse_with_defaults() {
        let cfg = parse(
            r#"
[sources.manual]
base_url = "https://manual.example.io/"

[sources.requirements]
endpoint = "https://api.airtable.com/v0/app/tbl?view=Grid"
"#,
        )
        .unwrap();
        let manual = cfg.sources.manual.unwrap();
        assert!(manual.load_all_paths);
        assert!(manual.exclude_globs.is_empty());
        assert_eq!(cfg.sources.requirements.unwrap().token_env, "AT_TOKEN");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = parse("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn fetch_k_must_cover_k() {
        let err = parse("[retrieval]\nk = 10\nfetch_k = 5\n").unwrap_err();
        assert!(err.to_string().contains("fetch_k"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse("[llm]\nprovider = \"llamacpp\"\n").unwrap_err();
        assert!(err.to_string().contains("llamacpp"));
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = parse(include_str!("../config/rfp.example.toml")).unwrap();
        assert_eq!(cfg.embedding.dims, Some(1536));
        assert!(cfg.sources.manual.is_some());
        assert!(cfg.sources.requirements.is_some());
    }

    #[test]
    fn embedding_dims_required() {
        let err = parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }
}
