//! Hosted reranking API client.
//!
//! Speaks the request/response shape shared by the Jina and Cohere rerank
//! endpoints: `POST {base}/rerank` with `{model, query, documents, top_n}`,
//! answered by `{results: [{index, relevance_score}]}`.
//!
//! This module is only available when the `http-reranker` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::reranker::{RerankHit, Reranker};

/// The default rerank API base URL.
pub const JINA_API_BASE: &str = "https://api.jina.ai/v1";

const DEFAULT_MODEL: &str = "jina-reranker-v2-base-multilingual";
const RERANKER: &str = "http";

/// A [`Reranker`] backed by a hosted rerank endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::http_reranker::HttpReranker;
///
/// let reranker = HttpReranker::new("jina_...")?.with_model("jina-reranker-v2-base-multilingual");
/// let hits = reranker.rerank("query", &documents, 5).await?;
/// ```
pub struct HttpReranker {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpReranker {
    /// Create a new client with the given API key and the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Configuration("rerank API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: JINA_API_BASE.into(),
            model: DEFAULT_MODEL.into(),
        })
    }

    /// Point the client at another rerank-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the reranking model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/rerank", self.base_url)
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

/// Reject hits pointing outside the submitted documents.
fn validate_hits(hits: Vec<RerankHit>, document_count: usize, top_n: usize) -> Result<Vec<RerankHit>> {
    if let Some(bad) = hits.iter().find(|hit| hit.index >= document_count) {
        return Err(RagError::reranker(
            RERANKER,
            format!("result index {} out of range for {document_count} documents", bad.index),
        ));
    }
    Ok(hits.into_iter().take(top_n).collect())
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<RerankHit>> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        debug!(reranker = RERANKER, model = %self.model, document_count = documents.len(), top_n, "reranking");

        let request_body = RerankRequest { model: &self.model, query, documents, top_n };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(reranker = RERANKER, error = %e, "request failed");
                RagError::reranker(RERANKER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(reranker = RERANKER, %status, "API error");
            return Err(RagError::reranker(RERANKER, format!("API returned {status}: {body}")));
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| {
            error!(reranker = RERANKER, error = %e, "failed to parse response");
            RagError::reranker(RERANKER, format!("failed to parse response: {e}"))
        })?;

        validate_hits(parsed.results, documents.len(), top_n)
    }

    fn name(&self) -> &str {
        RERANKER
    }
}
