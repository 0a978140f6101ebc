//! Hybrid retrieval: keyword + semantic search, merged, deduplicated, and
//! optionally reranked.
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_rag::{HybridRetriever, InMemoryChunkStore};
//!
//! let retriever = HybridRetriever::new(embedder, Arc::new(InMemoryChunkStore::new()))
//!     .with_reranker(Arc::new(reranker));
//!
//! let results = retriever.hybrid_search("who owned the necklace?", 5, 5, true, 3).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{SearchResult, SearchType, score_desc};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::store::ChunkStore;

/// Parameters of a single hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridQuery {
    /// Free-text query.
    pub query: String,
    /// Number of keyword results to request.
    pub keyword_k: usize,
    /// Number of semantic results to request.
    pub semantic_k: usize,
    /// Whether to rerank the merged candidates.
    pub rerank: bool,
    /// Number of results the reranker keeps.
    pub top_n: usize,
}

impl HybridQuery {
    /// A query using the budgets from `config`.
    pub fn from_config(query: impl Into<String>, config: &RagConfig) -> Self {
        Self {
            query: query.into(),
            keyword_k: config.keyword_k,
            semantic_k: config.semantic_k,
            rerank: config.rerank,
            top_n: config.top_n,
        }
    }
}

/// Combines full-text and vector-similarity search over a [`ChunkStore`].
///
/// Keyword and semantic queries run concurrently. Their results are
/// concatenated keyword-first and deduplicated by chunk id, so a chunk found
/// by both strategies is reported as a keyword hit. Scores from the two
/// strategies are never merged numerically.
pub struct HybridRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl HybridRetriever {
    /// Create a retriever without a reranker.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn ChunkStore>) -> Self {
        Self { embedding_provider, store, reranker: None }
    }

    /// Attach a reranker used when a query asks for reranking.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Whether a reranker is configured.
    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Run a hybrid query.
    ///
    /// See [`search`](Self::search) for the ordering and failure rules.
    pub async fn hybrid_search(
        &self,
        query: &str,
        keyword_k: usize,
        semantic_k: usize,
        rerank: bool,
        top_n: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search(&HybridQuery { query: query.to_string(), keyword_k, semantic_k, rerank, top_n })
            .await
    }

    /// Run a hybrid query.
    ///
    /// Returns results sorted by descending `relevance_score`; ties keep the
    /// keyword-first merge order. Without reranking, `relevance_score` equals
    /// `similarity_score`. With reranking, only the reranker's top `top_n`
    /// hits are returned.
    ///
    /// # Errors
    ///
    /// - [`RagError::RerankUnavailable`] if `rerank` is set and no reranker is configured
    /// - [`RagError::EmbeddingService`] if the query cannot be embedded
    /// - [`RagError::Retrieval`] if either store query fails
    /// - [`RagError::Reranker`] if the reranker fails
    ///
    /// No partial results are returned on error.
    pub async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchResult>> {
        let reranker = match (&self.reranker, query.rerank) {
            (_, false) => None,
            (Some(reranker), true) => Some(reranker),
            (None, true) => {
                error!("rerank requested without a configured reranker");
                return Err(RagError::RerankUnavailable);
            }
        };

        info!(
            keyword_k = query.keyword_k,
            semantic_k = query.semantic_k,
            rerank = query.rerank,
            top_n = query.top_n,
            "hybrid search"
        );

        let (keyword, semantic) = try_join(
            self.keyword_leg(&query.query, query.keyword_k),
            self.semantic_leg(&query.query, query.semantic_k),
        )
        .await?;
        debug!(keyword_count = keyword.len(), semantic_count = semantic.len(), "merging result sets");

        let merged = merge_results(keyword, semantic);
        let mut results = match reranker {
            Some(reranker) => apply_rerank(reranker.as_ref(), &query.query, merged, query.top_n).await?,
            None => merged,
        };
        sort_by_relevance(&mut results);

        info!(result_count = results.len(), "hybrid search completed");
        Ok(results)
    }

    async fn keyword_leg(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let hits = self.store.keyword_search(query, limit).await.map_err(|e| {
            error!(error = %e, "keyword search failed");
            RagError::Retrieval { message: format!("keyword search failed: {e}") }
        })?;
        Ok(hits.into_iter().map(|hit| SearchResult::from_scored(hit, SearchType::Keyword)).collect())
    }

    async fn semantic_leg(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            e
        })?;
        let hits = self.store.semantic_search(&embedding, limit).await.map_err(|e| {
            error!(error = %e, "semantic search failed");
            RagError::Retrieval { message: format!("semantic search failed: {e}") }
        })?;
        Ok(hits.into_iter().map(|hit| SearchResult::from_scored(hit, SearchType::Semantic)).collect())
    }
}

/// Concatenate keyword results before semantic results and drop every
/// repeated chunk id after its first occurrence.
pub fn merge_results(keyword: Vec<SearchResult>, semantic: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    keyword.into_iter().chain(semantic).filter(|result| seen.insert(result.chunk_id.clone())).collect()
}

/// Stable sort by descending `relevance_score`; NaN scores sort last.
pub fn sort_by_relevance(results: &mut [SearchResult]) {
    results.sort_by(|a, b| score_desc(a.relevance_score, b.relevance_score));
}

async fn apply_rerank(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<SearchResult>,
    top_n: usize,
) -> Result<Vec<SearchResult>> {
    if candidates.is_empty() || top_n == 0 {
        return Ok(Vec::new());
    }

    let documents: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
    let hits = reranker.rerank(query, &documents, top_n).await.map_err(|e| {
        error!(reranker = reranker.name(), error = %e, "reranking failed");
        match e {
            RagError::Reranker { .. } => e,
            other => RagError::reranker(reranker.name(), other.to_string()),
        }
    })?;

    let candidate_count = candidates.len();
    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut reranked = Vec::with_capacity(hits.len().min(top_n));
    for hit in hits {
        let slot = slots.get_mut(hit.index).ok_or_else(|| {
            RagError::reranker(
                reranker.name(),
                format!("result index {} out of range for {candidate_count} documents", hit.index),
            )
        })?;
        // A repeated index keeps its first score.
        if let Some(mut result) = slot.take() {
            result.relevance_score = hit.relevance_score;
            reranked.push(result);
        }
        if reranked.len() == top_n {
            break;
        }
    }
    Ok(reranked)
}
