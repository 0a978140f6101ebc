//! Document chunking.
//!
//! [`FixedSizeChunker`] splits text into overlapping windows of a fixed
//! number of characters. Sizes are counted in Unicode scalar values so that
//! multi-byte text (e.g. CJK sources) never splits inside a character.

use uuid::Uuid;

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// A window of source text and its starting character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Offset of the first character of the span, in characters.
    pub start: usize,
    /// The span's text.
    pub text: String,
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Each chunk after the first starts `chunk_size - chunk_overlap` characters
/// after the previous one. Every chunk gets a fresh UUID and inherits the
/// parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(300, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`](crate::RagError::Configuration) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks, in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into overlapping spans.
    ///
    /// Stops as soon as a span reaches the end of the text, so no trailing
    /// span lies entirely inside the previous one.
    pub fn spans(&self, text: &str) -> Vec<ChunkSpan> {
        // Byte offset of every character start, plus the end of the string.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            spans.push(ChunkSpan { start, text: text[boundaries[start]..boundaries[end]].to_string() });
            if end == char_count {
                break;
            }
            start += step;
        }
        spans
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.spans(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), chunk_index.into());
                Chunk {
                    id: Uuid::new_v4().to_string(),
                    document_id: document.id.clone(),
                    title: document.title.clone(),
                    content: span.text,
                    metadata,
                    embedding: Vec::new(),
                }
            })
            .collect()
    }
}
