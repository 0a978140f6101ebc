//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → store) and
//! hybrid querying by composing an [`EmbeddingProvider`], a [`ChunkStore`],
//! a [`Chunker`], and an optional [`Reranker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_rag::{RagPipeline, RagConfig, InMemoryChunkStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .store(Arc::new(InMemoryChunkStore::new()))
//!     .build()?;
//!
//! pipeline.initialize().await?;
//! let report = pipeline.ingest(&document).await;
//! let results = pipeline.query("search query").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Document, Metadata, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::retriever::{HybridQuery, HybridRetriever};
use crate::source::read_source_text;
use crate::store::{ChunkStore, MetadataFilter};

/// Metadata key holding the source file name of ingested files.
pub const FILE_NAME_KEY: &str = "file_name";

/// A chunk that could not be embedded or stored.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Identifier the chunk would have been stored under.
    pub chunk_id: String,
    /// Why the chunk was skipped.
    pub error: String,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// The ingested document's id.
    pub document_id: String,
    /// Ids of the chunks that were stored.
    pub stored: Vec<String>,
    /// Chunks that were skipped.
    pub failed: Vec<ChunkFailure>,
}

impl IngestReport {
    /// Whether every chunk was stored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    chunker: Arc<dyn Chunker>,
    retriever: HybridRetriever,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the hybrid retriever.
    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Create the store's tables and indexes for the provider's dimensionality.
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize(self.embedding_provider.dimensions()).await
    }

    /// Ingest a single document: chunk → embed → store, one chunk at a time.
    ///
    /// A chunk whose embedding or upsert fails is logged and skipped; the
    /// remaining chunks are still ingested. The returned report lists both.
    pub async fn ingest(&self, document: &Document) -> IngestReport {
        let chunks = self.chunker.chunk(document);
        let mut report = IngestReport { document_id: document.id.clone(), ..Default::default() };

        for (chunk_index, mut chunk) in chunks.into_iter().enumerate() {
            let outcome = match self.embedding_provider.embed(&chunk.content).await {
                Ok(embedding) => {
                    chunk.embedding = embedding;
                    self.store.upsert(&chunk).await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.stored.push(chunk.id),
                Err(e) => {
                    warn!(
                        document.id = %document.id,
                        chunk.id = %chunk.id,
                        chunk_index,
                        error = %e,
                        "skipping chunk"
                    );
                    report.failed.push(ChunkFailure {
                        chunk_index,
                        chunk_id: chunk.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            document.id = %document.id,
            stored = report.stored.len(),
            failed = report.failed.len(),
            "ingested document"
        );
        report
    }

    /// Ingest multiple documents, returning one report per document.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Vec<IngestReport> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await);
        }
        reports
    }

    /// Read a UTF-8 text or PDF file and ingest it.
    ///
    /// The file name becomes the document title and is recorded under the
    /// [`FILE_NAME_KEY`] metadata key, so the file's chunks can later be
    /// removed with [`delete_file`](Self::delete_file).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read, and
    /// [`RagError::Extraction`] if a PDF cannot be parsed. PDFs need the
    /// `pdf` feature; without it they fail with [`RagError::Configuration`].
    pub async fn ingest_file(&self, path: impl AsRef<Path>, metadata: Metadata) -> Result<IngestReport> {
        self.ingest_file_titled(path, None, metadata).await
    }

    /// Like [`ingest_file`](Self::ingest_file), with an explicit title.
    pub async fn ingest_file_titled(
        &self,
        path: impl AsRef<Path>,
        title: Option<String>,
        metadata: Metadata,
    ) -> Result<IngestReport> {
        let path = path.as_ref();
        let text = read_source_text(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut document = Document {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| file_name.clone()),
            text,
            metadata,
        };
        document.metadata.insert(FILE_NAME_KEY.to_string(), file_name.into());

        Ok(self.ingest(&document).await)
    }

    /// Delete every chunk matching the metadata filter.
    pub async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64> {
        let deleted = self.store.delete_where(filter).await?;
        info!(deleted, "deleted chunks");
        Ok(deleted)
    }

    /// Delete every chunk ingested from the named file.
    pub async fn delete_file(&self, file_name: &str) -> Result<u64> {
        self.delete_where(&MetadataFilter::where_eq(FILE_NAME_KEY, file_name)).await
    }

    /// Hybrid query using the configured budgets.
    pub async fn query(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retriever.search(&HybridQuery::from_config(query, &self.config)).await
    }

    /// Hybrid query with explicit budgets.
    pub async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchResult>> {
        self.retriever.search(query).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, and `store` are required. Without an
/// explicit chunker, a [`FixedSizeChunker`] is built from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn ChunkStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the chunk store.
    pub fn store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set a reranker for queries that request reranking.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the reranker if one is available.
    pub fn maybe_reranker(mut self, reranker: Option<Arc<dyn Reranker>>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a required field is missing or
    /// the config's chunk sizing is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self
            .config
            .ok_or_else(|| RagError::Configuration("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| RagError::Configuration("store is required".to_string()))?;
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let mut retriever = HybridRetriever::new(embedding_provider.clone(), store.clone());
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }

        Ok(RagPipeline { config, embedding_provider, store, chunker, retriever })
    }
}
