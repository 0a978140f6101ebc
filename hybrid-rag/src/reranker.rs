//! Reranker trait for re-scoring retrieval candidates.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::score_desc;
use crate::error::Result;
use crate::inmemory::tokenize;

/// One document kept by a reranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    /// Position of the document in the input slice.
    pub index: usize,
    /// Relevance of the document to the query (higher is more relevant).
    pub relevance_score: f32,
}

/// A reranker that scores candidate documents against a query.
///
/// Implementations can call hosted cross-encoder APIs, local models, or
/// simple heuristics. Only the returned hits survive reranking.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `documents` against `query` and return at most `top_n` hits,
    /// each referring to a document by index.
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<RerankHit>>;

    /// A short reranker name used in logs and errors.
    fn name(&self) -> &str {
        "reranker"
    }
}

/// A local reranker scoring documents by the fraction of distinct query
/// terms they contain.
///
/// Useful offline and in tests; it needs no model or network access.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::{KeywordOverlapReranker, Reranker};
///
/// let hits = KeywordOverlapReranker.rerank("rust vector search", &docs, 3).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordOverlapReranker;

#[async_trait]
impl Reranker for KeywordOverlapReranker {
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<RerankHit>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let mut hits: Vec<RerankHit> = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                let relevance_score = if terms.is_empty() {
                    0.0
                } else {
                    let words: HashSet<String> = tokenize(document).into_iter().collect();
                    terms.intersection(&words).count() as f32 / terms.len() as f32
                };
                RerankHit { index, relevance_score }
            })
            .collect();

        hits.sort_by(|a, b| score_desc(a.relevance_score, b.relevance_score));
        hits.truncate(top_n);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "keyword-overlap"
    }
}
