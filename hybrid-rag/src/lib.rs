//! Hybrid keyword + semantic retrieval over chunked documents.
//!
//! This crate provides:
//! - Fixed-size, overlapping, character-based chunking ([`FixedSizeChunker`])
//! - Embedding providers behind the [`EmbeddingProvider`] trait
//!   (OpenAI-compatible and Ollama, feature-gated)
//! - Chunk stores with full-text and vector search behind [`ChunkStore`]
//!   (in-memory always, pgvector behind the `pgvector` feature)
//! - A [`HybridRetriever`] that merges keyword and semantic hits,
//!   deduplicates them, and optionally reranks them
//! - A [`RagPipeline`] tying ingestion and retrieval together, and a
//!   [`RetrieveTool`] exposing retrieval to function-calling agents
//! - A [`RagAgent`] that answers questions by letting a function-calling
//!   chat model call that tool, with an OpenAI-compatible client in
//!   [`chat`] (`openai` feature)
//!
//! # Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `openai` | [`openai::OpenAIEmbeddingProvider`], [`chat::OpenAIChatModel`] |
//! | `ollama` | [`ollama::OllamaEmbeddingProvider`] |
//! | `http-reranker` | [`http_reranker::HttpReranker`] |
//! | `pgvector` | [`pgvector::PgChunkStore`] |
//! | `pdf` | PDF ingestion in [`RagPipeline::ingest_file`] |
//! | `full` | all of the above |

pub mod agent;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod pipeline;
pub mod provider;
pub mod reranker;
pub mod retriever;
pub mod settings;
pub mod source;
pub mod store;
pub mod tool;

#[cfg(feature = "openai")]
pub mod chat;
#[cfg(feature = "http-reranker")]
pub mod http_reranker;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use agent::{Answer, ChatMessage, ChatModel, RagAgent};
pub use chunking::{ChunkSpan, Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, Metadata, ScoredChunk, SearchResult, SearchType};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryChunkStore;
pub use pipeline::{ChunkFailure, FILE_NAME_KEY, IngestReport, RagPipeline, RagPipelineBuilder};
pub use provider::{build_chat_model, build_embedding_provider, build_reranker};
pub use reranker::{KeywordOverlapReranker, RerankHit, Reranker};
pub use retriever::{HybridQuery, HybridRetriever, merge_results, sort_by_relevance};
pub use settings::{
    ChatSettings, DatabaseSettings, EmbeddingBackend, EmbeddingSettings, RerankSettings, Settings,
    TableSettings,
};
pub use source::read_source_text;
pub use store::{ChunkStore, DistanceMetric, MetadataFilter, VectorIndex};
pub use tool::{RetrievalResponse, RetrieveTool};
