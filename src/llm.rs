//! Language-model capability.
//!
//! [`LanguageModel::complete`] takes a fully rendered prompt and a sampling
//! temperature and returns the model's free-text response verbatim.
//!
//! Providers:
//! - **[`OpenAiChat`]**: `POST https://api.openai.com/v1/chat/completions`
//!   with the prompt as a single user message. Key from `OPENAI_API_KEY`.
//! - **[`OllamaGenerate`]**: `POST {url}/api/generate` with `stream: false`.
//!
//! Transport failures and 429/5xx responses are retried with exponential
//! backoff. Anything still failing surfaces as an [`LlmError`] so the caller
//! can tell an unreachable model from a bad response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport failure, or retries exhausted on transient statuses.
    #[error("language model unreachable: {0}")]
    Unreachable(String),

    /// Non-retryable HTTP status.
    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not in the expected shape.
    #[error("language model response malformed: {0}")]
    Decode(String),

    #[error("language model misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError>;
}

/// Build the configured provider.
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LanguageModel>, LlmError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerate::new(config)?)),
        other => Err(LlmError::Config(format!("unknown llm provider: {}", other))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Config(e.to_string()))
}

// ============ OpenAI chat completions ============

pub struct OpenAiChat {
    model: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            client: http_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let request = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body);

        let text = send_with_retry(request, self.max_retries).await?;
        parse_chat_response(&text)
    }
}

fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::Decode("no choices in response".into()))
}

// ============ Ollama generate ============

pub struct OllamaGenerate {
    model: String,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerate {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        Ok(Self {
            model: config.model.clone(),
            url,
            client: http_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaGenerate {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        let request = self
            .client
            .post(format!("{}/api/generate", self.url.trim_end_matches('/')))
            .json(&body);

        let text = send_with_retry(request, self.max_retries).await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(parsed.response)
    }
}

// ============ Shared ============

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
) -> Result<String, LlmError> {
    let mut last_err = String::from("no attempt made");

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(attempt, ?delay, error = %last_err, "retrying language model call");
            tokio::time::sleep(delay).await;
        }

        let req = request
            .try_clone()
            .ok_or_else(|| LlmError::Config("request body cannot be retried".into()))?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if status.is_success() {
                    return Ok(body);
                }
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = format!("status {}: {}", status, body);
                    continue;
                }
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                last_err = e.to_string();
            }
        }
    }

    Err(LlmError::Unreachable(last_err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Yes, it can."}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Yes, it can.");
    }

    #[test]
    fn chat_response_without_choices() {
        let err = parse_chat_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
        let err = parse_chat_response("not json").unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
    }

    #[test]
    fn request_serializes_temperature() {
        let req = ChatRequest {
            model: "m",
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: "p",
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn unreachable_ollama_is_reported() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            url: Some("http://127.0.0.1:9".to_string()),
            max_retries: 0,
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let llm = create_llm(&config).unwrap();
        let err = llm.complete("hello", 0.0).await.unwrap_err();
        assert!(matches!(err, LlmError::Unreachable(_)), "{err}");
    }
}
