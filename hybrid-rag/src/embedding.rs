//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI-compatible APIs,
/// a local Ollama server, ...) behind a unified async interface. Failures are
/// reported as [`RagError::EmbeddingService`](crate::RagError::EmbeddingService).
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Returns exactly one vector per input, in order. The default
    /// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
    /// backends with native batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short provider name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Flatten newlines before sending text to an embedding model.
#[cfg_attr(not(any(feature = "openai", feature = "ollama")), allow(dead_code))]
pub(crate) fn normalize_input(text: &str) -> String {
    text.replace('\n', " ")
}
