//! Configuration for chunking and hybrid retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Chunking and retrieval parameters.
///
/// Construct a validated instance with [`RagConfig::builder()`]; the
/// [`Default`] values are already consistent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of lexical (full-text) results requested per hybrid query.
    pub keyword_k: usize,
    /// Number of vector-similarity results requested per hybrid query.
    pub semantic_k: usize,
    /// Whether hybrid queries rerank their merged candidates by default.
    pub rerank: bool,
    /// Number of results the reranker keeps.
    pub top_n: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50, keyword_k: 5, semantic_k: 5, rerank: true, top_n: 5 }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the chunk sizing can terminate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)
    }
}

pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Configuration("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of keyword results requested per query.
    pub fn keyword_k(mut self, k: usize) -> Self {
        self.config.keyword_k = k;
        self
    }

    /// Set the number of semantic results requested per query.
    pub fn semantic_k(mut self, k: usize) -> Self {
        self.config.semantic_k = k;
        self
    }

    /// Enable or disable reranking by default.
    pub fn rerank(mut self, rerank: bool) -> Self {
        self.config.rerank = rerank;
        self
    }

    /// Set the number of results kept by the reranker.
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
