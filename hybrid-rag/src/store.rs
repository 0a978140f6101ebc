//! Chunk store trait: persistence plus lexical and vector search.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Chunk, Metadata, ScoredChunk};
use crate::error::{RagError, Result};

/// A storage backend for chunks with full-text and vector-similarity search.
///
/// The store owns its connection handling; implementations must be safe to
/// share across concurrent queries. Writes are single-statement, so no
/// caller-side locking is required.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::{ChunkStore, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new();
/// store.upsert(&chunk).await?;
/// let lexical = store.keyword_search("necklace price", 5).await?;
/// let semantic = store.semantic_search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Create tables and indexes for vectors of the given dimensionality.
    /// No-op if they already exist.
    async fn initialize(&self, dimensions: usize) -> Result<()>;

    /// Insert or replace a chunk. The chunk must have its embedding set.
    async fn upsert(&self, chunk: &Chunk) -> Result<()>;

    /// Return up to `limit` chunks ranked by lexical relevance over
    /// title, content, and metadata. Chunks that do not match are omitted.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Return up to `limit` chunks ranked by similarity to `embedding`,
    /// most similar first.
    async fn semantic_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Delete every chunk whose metadata matches the filter.
    ///
    /// Returns the number of chunks deleted.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64>;
}

/// A conjunction of metadata equality conditions.
///
/// A chunk matches when every key is present in its metadata with an equal
/// JSON value. Filters are never empty, so a delete can never match the
/// whole store by accident.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataFilter {
    conditions: Metadata,
}

impl MetadataFilter {
    /// Build a filter from key/value conditions.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `conditions` is empty.
    pub fn new(conditions: Metadata) -> Result<Self> {
        if conditions.is_empty() {
            return Err(RagError::Configuration(
                "metadata filter needs at least one condition".to_string(),
            ));
        }
        Ok(Self { conditions })
    }

    /// A single-condition filter.
    pub fn where_eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut conditions = Metadata::new();
        conditions.insert(key.into(), value.into());
        Self { conditions }
    }

    /// Add another condition.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// The filter's conditions.
    pub fn conditions(&self) -> &Metadata {
        &self.conditions
    }

    /// Whether `metadata` satisfies every condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// The vector similarity metric a store ranks semantic queries by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw inner product.
    InnerProduct,
    /// Euclidean distance, reported as a negated score so higher is better.
    L2,
}

impl DistanceMetric {
    /// Similarity of two vectors under this metric (higher is more similar).
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::L2 => {
                -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::InnerProduct => write!(f, "inner_product"),
            DistanceMetric::L2 => write!(f, "l2"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "inner_product" | "ip" | "dot" => Ok(DistanceMetric::InnerProduct),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            other => Err(RagError::Configuration(format!("unknown distance metric: {other}"))),
        }
    }
}

/// The approximate-nearest-neighbour index a store builds over embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VectorIndex {
    /// Inverted-file index with the given number of lists.
    IvfFlat {
        /// Number of inverted lists.
        lists: u32,
    },
    /// Hierarchical navigable small-world graph.
    Hnsw,
    /// Exact scan, no index.
    #[default]
    None,
}

impl FromStr for VectorIndex {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ivfflat" => Ok(VectorIndex::IvfFlat { lists: 100 }),
            "hnsw" => Ok(VectorIndex::Hnsw),
            "none" | "" => Ok(VectorIndex::None),
            other => Err(RagError::Configuration(format!("unknown vector index: {other}"))),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
