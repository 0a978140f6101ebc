//! In-memory chunk store with lexical and vector search.
//!
//! [`InMemoryChunkStore`] keeps chunks in insertion order behind a
//! `tokio::sync::RwLock`. It is suitable for development, testing, and
//! small corpora; ties in either ranking keep insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, ScoredChunk, score_desc};
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, DistanceMetric, MetadataFilter};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Inner {
    dimensions: Option<usize>,
    chunks: Vec<Chunk>,
}

/// An in-memory [`ChunkStore`].
///
/// Keyword search tokenizes title, content, and metadata values into
/// lowercase words (each CJK character is its own token) and ranks chunks by
/// query-term frequency, damped by document length. Semantic search ranks by
/// the configured [`DistanceMetric`].
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::{ChunkStore, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new();
/// store.initialize(384).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    metric: DistanceMetric,
    inner: RwLock<Inner>,
}

impl InMemoryChunkStore {
    /// Create a new empty store ranking by cosine similarity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store ranking by the given metric.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self { metric, inner: RwLock::default() }
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.chunks.len()
    }

    /// Whether the store holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.chunks.is_empty()
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'   // Hiragana, Katakana
        | '\u{3400}'..='\u{4DBF}' // CJK Extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK Unified Ideographs
        | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        | '\u{F900}'..='\u{FAFF}')
}

/// Split text into lowercase word tokens; every CJK character is a token.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if is_cjk(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Lexical rank of a chunk for the given query terms; 0.0 when nothing matches.
fn lexical_score(chunk: &Chunk, terms: &[String]) -> f32 {
    let mut text = format!("{} {}", chunk.title, chunk.content);
    for value in chunk.metadata.values() {
        text.push(' ');
        match value.as_str() {
            Some(s) => text.push_str(s),
            None => text.push_str(&value.to_string()),
        }
    }

    let tokens = tokenize(&text);
    if tokens.is_empty() {
        return 0.0;
    }
    let mut frequencies: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *frequencies.entry(token.as_str()).or_default() += 1;
    }

    let hits: usize = terms.iter().map(|t| frequencies.get(t.as_str()).copied().unwrap_or(0)).sum();
    hits as f32 / (1.0 + (tokens.len() as f32).ln())
}

fn ranked(mut scored: Vec<ScoredChunk>, limit: usize) -> Vec<ScoredChunk> {
    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| score_desc(a.score, b.score));
    scored.truncate(limit);
    scored
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn initialize(&self, dimensions: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.dimensions {
            Some(existing) if existing != dimensions => Err(RagError::store(
                BACKEND,
                format!("store already initialized with {existing} dimensions, not {dimensions}"),
            )),
            _ => {
                inner.dimensions = Some(dimensions);
                Ok(())
            }
        }
    }

    async fn upsert(&self, chunk: &Chunk) -> Result<()> {
        if chunk.embedding.is_empty() {
            return Err(RagError::store(BACKEND, format!("chunk '{}' has no embedding", chunk.id)));
        }
        let mut inner = self.inner.write().await;
        if let Some(dimensions) = inner.dimensions {
            if chunk.embedding.len() != dimensions {
                return Err(RagError::store(
                    BACKEND,
                    format!(
                        "chunk '{}' has {} dimensions, store expects {dimensions}",
                        chunk.id,
                        chunk.embedding.len()
                    ),
                ));
            }
        }
        match inner.chunks.iter_mut().find(|existing| existing.id == chunk.id) {
            Some(existing) => *existing = chunk.clone(),
            None => inner.chunks.push(chunk.clone()),
        }
        Ok(())
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let terms = tokenize(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        let scored = inner
            .chunks
            .iter()
            .filter_map(|chunk| {
                let score = lexical_score(chunk, &terms);
                (score > 0.0).then(|| ScoredChunk { chunk: chunk.clone(), score })
            })
            .collect();
        let results = ranked(scored, limit);
        debug!(backend = BACKEND, result_count = results.len(), "keyword search");
        Ok(results)
    }

    async fn semantic_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().await;
        if let Some(dimensions) = inner.dimensions {
            if embedding.len() != dimensions {
                return Err(RagError::store(
                    BACKEND,
                    format!("query has {} dimensions, store expects {dimensions}", embedding.len()),
                ));
            }
        }
        let scored = inner
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: self.metric.similarity(&chunk.embedding, embedding),
            })
            .collect();
        let results = ranked(scored, limit);
        debug!(backend = BACKEND, result_count = results.len(), "semantic search");
        Ok(results)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.chunks.len();
        inner.chunks.retain(|chunk| !filter.matches(&chunk.metadata));
        let deleted = (before - inner.chunks.len()) as u64;
        debug!(backend = BACKEND, deleted, "deleted chunks by metadata filter");
        Ok(deleted)
    }
}
