//! Embedding capability and providers.
//!
//! [`Embedder`] maps texts to fixed-dimension vectors. Two HTTP providers
//! ship with the crate:
//!
//! - **[`OpenAiEmbedder`]**: `POST https://api.openai.com/v1/embeddings`,
//!   key from `OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama.
//!
//! Both retry transient failures with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff 1s, 2s, 4s, … capped at 32s
//!
//! Also provides the vector helpers used by the index:
//! [`cosine_similarity`], [`vec_to_blob`] and [`blob_to_vec`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Text embedding capability.
///
/// `embed` returns one vector per input text, in input order, each of
/// length [`dims`](Embedder::dims). Implementations must be deterministic
/// for a fixed model.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Embed `texts` in batches of `batch_size`, checking the vector count and
/// dimensionality of every response.
pub async fn embed_batched(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embedder.embed(batch).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }
        for v in &vectors {
            if v.len() != embedder.dims() {
                bail!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    embedder.dims(),
                    v.len()
                );
            }
        }
        out.extend(vectors);
    }
    Ok(out)
}

/// Build the configured provider.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn required_model_and_dims(config: &EmbeddingConfig) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;
    Ok((model, dims))
}

// ============ OpenAI ============

pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiEmbedder {
    /// Fails when `OPENAI_API_KEY` is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config)?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, json_to_vec(embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config)?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "Ollama").await?;
        let embeddings = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

        embeddings.iter().map(json_to_vec).collect()
    }
}

// ============ Shared HTTP plumbing ============

/// Send a JSON request, retrying 429/5xx and network errors with backoff.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    provider: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(provider, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let Some(req) = request.try_clone() else {
            bail!("{} request body cannot be retried", provider);
        };

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = anyhow::anyhow!("{} API error {}: {}", provider, status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error: {}", provider, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} embedding failed after retries", provider)))
}

fn json_to_vec(value: &serde_json::Value) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding: not an array"))?;
    Ok(arr
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Vector helpers ============

/// Encode a vector as little-endian `f32` bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverse of [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant {
        dims: usize,
        short: bool,
    }

    #[async_trait]
    impl Embedder for Constant {
        fn model_name(&self) -> &str {
            "constant"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let len = if self.short { self.dims - 1 } else { self.dims };
            Ok(texts.iter().map(|_| vec![1.0; len]).collect())
        }
    }

    #[test]
    fn test_blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn test_cosine() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_openai_response_reordered_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_openai_response_missing_data() {
        let err = parse_openai_response(&serde_json::json!({"error": "x"})).unwrap_err();
        assert!(err.to_string().contains("missing data array"));
    }

    #[tokio::test]
    async fn test_batched_counts_and_dims() {
        let texts: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let ok = Constant {
            dims: 3,
            short: false,
        };
        let vecs = embed_batched(&ok, &texts, 2).await.unwrap();
        assert_eq!(vecs.len(), 5);

        let bad = Constant {
            dims: 3,
            short: true,
        };
        let err = embed_batched(&bad, &texts, 2).await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "local".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
