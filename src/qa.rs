//! Retrieval-augmented question answering.
//!
//! One call per prompt: retrieve chunks by MMR, render them into
//! [`PROMPT_TEMPLATE`] together with the prompt, ask the language model at
//! temperature 0, and return its response verbatim with the chunks used.

use anyhow::Result;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::index::Index;
use crate::llm::LanguageModel;
use crate::models::{Answer, Chunk};
use crate::search;

/// Sampling temperature for every answer.
pub const TEMPERATURE: f32 = 0.0;

/// Placeholders: `{product}`, `{context}`, `{question}`.
pub const PROMPT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end.
Answer with either yes or no and an explanation about why {product} can or cannot do the task mentioned in the prompt.
If you don't find enough information in the context, just say that you don't know the answer, do not make up an answer.
{context}
Question: Does {product} {question} ?
Helpful Answer:";

/// Render the prompt sent to the model. Chunk texts are joined by a blank
/// line.
pub fn build_prompt(product: &str, chunks: &[Chunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    PROMPT_TEMPLATE
        .replace("{product}", product)
        .replace("{question}", question)
        .replace("{context}", &context)
}

/// Borrowed view of everything one answer needs.
pub struct QaEngine<'a> {
    pub index: &'a Index,
    pub embedder: &'a dyn Embedder,
    pub llm: &'a dyn LanguageModel,
    pub product: &'a str,
    pub retrieval: &'a RetrievalConfig,
}

impl<'a> QaEngine<'a> {
    /// Answer one prompt. A model failure is returned as an error wrapping
    /// [`LlmError`](crate::llm::LlmError); nothing is retried beyond the
    /// provider's own backoff.
    pub async fn answer(&self, prompt: &str) -> Result<Answer> {
        let chunks = search::retrieve(self.index, self.embedder, prompt, self.retrieval).await?;
        let rendered = build_prompt(self.product, &chunks, prompt);

        tracing::debug!(prompt, chunks = chunks.len(), "asking language model");
        let result = self.llm.complete(&rendered, TEMPERATURE).await?;

        Ok(Answer {
            query: prompt.to_string(),
            result,
            source_documents: chunks,
        })
    }
}
