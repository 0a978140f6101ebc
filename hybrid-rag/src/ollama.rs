//! Ollama embedding provider using a local Ollama server's `/api/embed` endpoint.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, normalize_input};
use crate::error::{RagError, Result};

/// The default Ollama server URL.
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;
const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434")
///     .with_model("nomic-embed-text")
///     .with_dimensions(768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider talking to the Ollama server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Set the embedding model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the dimensionality the model produces.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new(OLLAMA_DEFAULT_URL)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

/// Ollama returns `embeddings` as a list of vectors; some server versions
/// return a single flat vector for single inputs.
#[derive(Deserialize)]
#[serde(untagged)]
enum Embeddings {
    Nested(Vec<Vec<f32>>),
    Flat(Vec<f32>),
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Embeddings,
}

fn into_vectors(embeddings: Embeddings, expected: usize) -> Result<Vec<Vec<f32>>> {
    let vectors = match embeddings {
        Embeddings::Nested(vectors) => vectors,
        Embeddings::Flat(vector) => vec![vector],
    };
    if vectors.len() != expected {
        return Err(RagError::embedding(
            PROVIDER,
            format!("expected {expected} embeddings, got {}", vectors.len()),
        ));
    }
    if vectors.iter().any(Vec::is_empty) {
        return Err(RagError::embedding(PROVIDER, "server returned an empty embedding"));
    }
    Ok(vectors)
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "server returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbedRequest {
            model: &self.model,
            input: texts.iter().map(|t| normalize_input(t)).collect(),
        };

        let response =
            self.client.post(self.endpoint()).json(&request_body).send().await.map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::embedding(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "server error");
            return Err(RagError::embedding(PROVIDER, format!("server returned {status}: {body}")));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("unexpected response format: {e}"))
        })?;

        into_vectors(parsed.embeddings, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
