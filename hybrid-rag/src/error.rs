//! Error types for the `hybrid-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting or retrieving chunks.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration, e.g. chunk overlap not smaller than chunk size.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The embedding service failed to produce a vector.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A store query failed while answering a hybrid search.
    ///
    /// No partial result list accompanies this error.
    #[error("Retrieval error: {message}")]
    Retrieval {
        /// A description of the failure, including the failing search leg.
        message: String,
    },

    /// Reranking was requested but no reranker is configured.
    #[error("Rerank requested but no reranker is configured")]
    RerankUnavailable,

    /// An error raised by a chunk store backend.
    #[error("Store error ({backend}): {message}")]
    Store {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The configured reranker failed or returned malformed data.
    #[error("Reranker error ({reranker}): {message}")]
    Reranker {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// Text could not be extracted from a source document.
    #[error("Extraction error ({path}): {message}")]
    Extraction {
        /// The file being read.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The chat completion service failed or answered with something unusable.
    #[error("Chat error: {message}")]
    Chat {
        /// A description of the failure.
        message: String,
    },

    /// Encoding or decoding JSON failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading a source file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingService { provider: provider.to_string(), message: message.into() }
    }

    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        Self::Store { backend: backend.to_string(), message: message.into() }
    }

    #[cfg_attr(not(feature = "pdf"), allow(dead_code))]
    pub(crate) fn extraction(path: &str, message: impl Into<String>) -> Self {
        Self::Extraction { path: path.to_string(), message: message.into() }
    }

    pub(crate) fn reranker(reranker: &str, message: impl Into<String>) -> Self {
        Self::Reranker { reranker: reranker.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
