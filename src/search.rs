//! Diversity-aware retrieval with maximal marginal relevance (MMR).
//!
//! Retrieval runs in two stages:
//!
//! 1. The `fetch_k` chunks nearest to the query by cosine similarity are
//!    pulled from the [`Index`].
//! 2. [`mmr_select`] greedily picks `k` of them. The first pick is the most
//!    similar candidate; each following pick maximizes
//!
//! ```text
//! λ · sim(query, c) − (1 − λ) · max sim(c, s) over already-selected s
//! ```
//!
//! With `λ = 1` this degrades to plain nearest-neighbour order; lower values
//! push near-duplicates of already-selected chunks down the list.

use anyhow::Result;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::index::{Index, ScoredChunk};
use crate::models::Chunk;

/// Select up to `k` candidates by MMR, returned in selection order.
///
/// `candidates[i].score` must be the candidate's similarity to `query`.
/// Ties go to the earlier candidate.
pub fn mmr_select(candidates: &[ScoredChunk], k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut selected: Vec<usize> = vec![argmax(candidates.iter().map(|c| c.score))];

    while selected.len() < k.min(candidates.len()) {
        let gains = candidates.iter().enumerate().map(|(i, c)| {
            if selected.contains(&i) {
                return f32::NEG_INFINITY;
            }
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(&c.embedding, &candidates[s].embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            lambda * c.score - (1.0 - lambda) * redundancy
        });
        let next = argmax(gains);
        selected.push(next);
    }

    selected
}

/// Index of the first maximum.
fn argmax(values: impl Iterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    best
}

/// Embed `query` and return the `k` chunks chosen by MMR.
pub async fn retrieve(
    index: &Index,
    embedder: &dyn Embedder,
    query: &str,
    config: &RetrievalConfig,
) -> Result<Vec<Chunk>> {
    let query_vec = embed_query(embedder, query).await?;
    let candidates = index.candidates(&query_vec, config.fetch_k).await?;
    let picked = mmr_select(&candidates, config.k, config.lambda_mult);

    tracing::debug!(
        candidates = candidates.len(),
        selected = picked.len(),
        "mmr retrieval"
    );

    Ok(picked
        .into_iter()
        .map(|i| candidates[i].chunk.clone())
        .collect())
}
