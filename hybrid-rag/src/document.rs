//! Data types for documents, chunks, and search results.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to documents and chunks.
pub type Metadata = HashMap<String, Value>;

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Human-readable title, typically the source file name.
    pub title: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata copied onto every chunk of the document.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), text: text.into(), metadata: Metadata::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous span of a [`Document`] with its vector embedding.
///
/// Chunks are immutable once stored; they are only ever deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Title of the parent document.
    pub title: String,
    /// The text content of the chunk.
    pub content: String,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: Metadata,
    /// The vector embedding for this chunk's content. Empty until embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

/// A stored [`Chunk`] paired with the score a store query assigned it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Lexical rank or vector similarity, depending on the query (higher is better).
    pub score: f32,
}

/// Which retrieval strategy produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Vector-similarity match.
    Semantic,
    /// Full-text match.
    Keyword,
}

impl SearchType {
    /// The lowercase tag used in serialized results.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Semantic => "semantic",
            SearchType::Keyword => "keyword",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored candidate returned by a hybrid query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Identifier of the matched chunk.
    pub chunk_id: String,
    /// Title of the chunk's parent document.
    pub title: String,
    /// The chunk text.
    pub content: String,
    /// Chunk metadata.
    pub metadata: Metadata,
    /// Score from the store: similarity for semantic hits, lexical rank for keyword hits.
    pub similarity_score: f32,
    /// The strategy that surfaced this chunk.
    pub search_type: SearchType,
    /// Final sort key: the reranker's score, or `similarity_score` when not reranked.
    pub relevance_score: f32,
}

impl SearchResult {
    /// Build an unreranked result from a store hit.
    pub fn from_scored(scored: ScoredChunk, search_type: SearchType) -> Self {
        let ScoredChunk { chunk, score } = scored;
        Self {
            chunk_id: chunk.id,
            title: chunk.title,
            content: chunk.content,
            metadata: chunk.metadata,
            similarity_score: score,
            search_type,
            relevance_score: score,
        }
    }
}

/// Total descending order on scores. NaN ranks below every number.
pub fn score_desc(a: f32, b: f32) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b).total_cmp(&key(a))
}
