//! Function-calling surface for hybrid retrieval.
//!
//! [`RetrieveTool`] wraps a [`RagPipeline`] so an LLM agent can call hybrid
//! search as a tool: it publishes a JSON schema for its arguments and
//! answers with a [`RetrievalResponse`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hybrid_rag::{RagPipeline, RetrieveTool};
//!
//! let tool = RetrieveTool::new(Arc::new(build_pipeline()?));
//!
//! // The model calls the tool with:
//! // { "query": "Whose necklace was it?", "keyword_k": 5, "semantic_k": 5, "rerank": true, "top_n": 5 }
//! let response = tool.execute(args).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::document::{SearchResult, SearchType};
use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;
use crate::retriever::HybridQuery;

/// The payload returned to the model after a retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResponse {
    /// Always `"success"`; failures surface as errors instead.
    pub status: String,
    /// The ranked results.
    pub results: Vec<SearchResult>,
    /// Number of results.
    pub total_results: usize,
    /// Distinct search types present in `results`, in order of first appearance.
    pub search_types: Vec<SearchType>,
}

impl RetrievalResponse {
    /// Wrap a ranked result list.
    pub fn new(results: Vec<SearchResult>) -> Self {
        let mut search_types = Vec::new();
        for result in &results {
            if !search_types.contains(&result.search_type) {
                search_types.push(result.search_type);
            }
        }
        Self { status: "success".to_string(), total_results: results.len(), results, search_types }
    }
}

/// A retrieval tool that wraps a [`RagPipeline`] for agentic use.
///
/// The tool accepts a required `query` string and optional `keyword_k`,
/// `semantic_k`, `rerank`, and `top_n` parameters; omitted parameters fall
/// back to the pipeline's [`RagConfig`](crate::RagConfig).
pub struct RetrieveTool {
    pipeline: Arc<RagPipeline>,
}

impl RetrieveTool {
    /// Create a new `RetrieveTool` backed by the given pipeline.
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }

    /// The tool name exposed to the model.
    pub fn name(&self) -> &str {
        "retrieve"
    }

    /// The tool description exposed to the model.
    pub fn description(&self) -> &str {
        "Retrieve relevant document chunks using hybrid keyword and semantic search"
    }

    /// JSON schema of the tool arguments.
    pub fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query string"
                },
                "keyword_k": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Number of keyword search results"
                },
                "semantic_k": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Number of semantic search results"
                },
                "rerank": {
                    "type": "boolean",
                    "description": "Whether to apply reranking"
                },
                "top_n": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Number of top results to return after reranking"
                }
            },
            "required": ["query"]
        })
    }

    /// Parse tool arguments into a query, filling defaults from the pipeline config.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `query` is missing, an
    /// optional argument has the wrong type, or a count exceeds `i64::MAX`.
    pub fn parse_args(&self, args: &Value) -> Result<HybridQuery> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| RagError::Configuration("missing required 'query' parameter".into()))?;

        let mut parsed = HybridQuery::from_config(query, self.pipeline.config());
        if let Some(k) = optional_count(args, "keyword_k")? {
            parsed.keyword_k = k;
        }
        if let Some(k) = optional_count(args, "semantic_k")? {
            parsed.semantic_k = k;
        }
        if let Some(n) = optional_count(args, "top_n")? {
            parsed.top_n = n;
        }
        match args.get("rerank") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(rerank)) => parsed.rerank = *rerank,
            Some(other) => {
                return Err(RagError::Configuration(format!("'rerank' must be a boolean, got {other}")));
            }
        }
        Ok(parsed)
    }

    /// Execute a tool call and serialize the [`RetrievalResponse`].
    pub async fn execute(&self, args: Value) -> Result<Value> {
        let query = self.parse_args(&args)?;
        info!(
            query = %query.query,
            keyword_k = query.keyword_k,
            semantic_k = query.semantic_k,
            rerank = query.rerank,
            top_n = query.top_n,
            "retrieve tool called"
        );

        let results = self.pipeline.search(&query).await.map_err(|e| {
            error!(error = %e, "retrieve tool failed");
            e
        })?;

        let response = RetrievalResponse::new(results);
        info!(total_results = response.total_results, search_types = ?response.search_types, "retrieve tool completed");

        serde_json::to_value(&response).map_err(|e| {
            error!(error = %e, "failed to serialize search results");
            RagError::from(e)
        })
    }
}

fn optional_count(args: &Value, key: &str) -> Result<Option<usize>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let count = value
                .as_u64()
                .ok_or_else(|| RagError::Configuration(format!("'{key}' must be a non-negative integer")))?;
            // Store backends take limits as signed 64-bit integers.
            i64::try_from(count)
                .ok()
                .and_then(|_| usize::try_from(count).ok())
                .map(Some)
                .ok_or_else(|| RagError::Configuration(format!("'{key}' is too large: {count}")))
        }
    }
}
