//! OpenAI-compatible chat completions with tool calling.
//!
//! Talks to any server exposing `/v1/chat/completions` with the `tools`
//! parameter. Used by [`RagAgent`](crate::agent::RagAgent) to answer
//! questions over the chunk store.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::agent::{AssistantTurn, ChatMessage, ChatModel, ToolCall, ToolDefinition};
use crate::error::{RagError, Result};
use crate::openai::OPENAI_API_BASE;
use crate::settings::DEFAULT_CHAT_MODEL;

/// A [`ChatModel`] backed by an OpenAI-compatible chat completions API.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatModel {
    /// Create a client for `gpt-4o-mini` on the public OpenAI endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Configuration("chat API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Point the client at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn first_turn(response: CompletionResponse) -> Result<AssistantTurn> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Chat { message: "API returned no choices".into() })?;
    Ok(AssistantTurn {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<AssistantTurn> {
        debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let request_body = CompletionRequest { model: &self.model, messages, tools };
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "chat request failed");
                RagError::Chat { message: format!("request failed: {e}") }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.model, %status, "chat API error");
            return Err(RagError::Chat { message: format!("API returned {status}: {detail}") });
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse chat response");
            RagError::Chat { message: format!("failed to parse response: {e}") }
        })?;

        let turn = first_turn(completion)?;
        debug!(tool_calls = turn.tool_calls.len(), has_content = turn.content.is_some(), "chat turn received");
        Ok(turn)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
