//! Question answering by a function-calling chat model.
//!
//! A [`RagAgent`] hands the user's question to a [`ChatModel`] together with
//! the [`RetrieveTool`] definition. Whenever the model asks for the tool, the
//! agent runs the hybrid search and sends the [`RetrievalResponse`] back,
//! until the model replies with a plain answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hybrid_rag::agent::RagAgent;
//! use hybrid_rag::chat::OpenAIChatModel;
//!
//! let model = OpenAIChatModel::new(api_key)?.with_model("gpt-4o-mini");
//! let agent = RagAgent::new(Arc::new(model), RetrieveTool::new(pipeline));
//! let answer = agent.ask("Whose necklace was it, and what was it worth?").await?;
//! println!("{}", answer.text);
//! ```
//!
//! [`RetrievalResponse`]: crate::tool::RetrievalResponse

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::error::{RagError, Result};
use crate::tool::RetrieveTool;

/// Tool rounds allowed before the agent gives up on getting an answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

const SYSTEM_PROMPT: &str = "You answer questions about a private document collection. \
Use the `retrieve` tool to search it before answering and base your answer on the returned chunks. \
If they do not contain the answer, say so. Answer in the language of the question.";

/// One message of a chat conversation, in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// Instructions for the model.
    System {
        /// Message text.
        content: String,
    },
    /// The user's question.
    User {
        /// Message text.
        content: String,
    },
    /// A model reply: text, tool calls, or both.
    Assistant {
        /// Reply text, absent when the model only calls tools.
        #[serde(default)]
        content: Option<String>,
        /// Tool invocations requested by the model.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The result of one tool call.
    Tool {
        /// Id of the [`ToolCall`] this answers.
        tool_call_id: String,
        /// JSON-encoded tool output.
        content: String,
    },
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier echoed back in the matching [`ChatMessage::Tool`].
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    /// The function name and its JSON-encoded arguments.
    pub function: FunctionCall,
}

/// Function name and arguments of a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool.
    pub name: String,
    /// Arguments as a JSON string, exactly as the model produced them.
    pub arguments: String,
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Name, description, and argument schema.
    pub function: FunctionDefinition,
}

/// The function part of a [`ToolDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Describe the retrieval tool.
    pub fn for_retrieve(tool: &RetrieveTool) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            },
        }
    }
}

fn function_kind() -> String {
    "function".to_string()
}

/// A model reply as seen by the agent loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    fn into_message(self) -> ChatMessage {
        ChatMessage::Assistant { content: self.content, tool_calls: self.tool_calls }
    }
}

/// A chat model that can call tools.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant turn for `messages`, offering `tools`.
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<AssistantTurn>;

    /// Model name used in logs.
    fn name(&self) -> &str {
        "chat"
    }
}

/// The final answer of a [`RagAgent`] run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// The model's answer text.
    pub text: String,
    /// Number of retrieval calls made along the way.
    pub retrievals: usize,
}

/// Answers questions by letting a [`ChatModel`] call a [`RetrieveTool`].
pub struct RagAgent {
    model: Arc<dyn ChatModel>,
    tool: RetrieveTool,
    max_tool_rounds: usize,
    system_prompt: String,
}

impl RagAgent {
    /// Create an agent with the default prompt and round limit.
    pub fn new(model: Arc<dyn ChatModel>, tool: RetrieveTool) -> Self {
        Self {
            model,
            tool,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Limit how many rounds of tool calls the model may make.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Answer `question`, running retrievals as the model requests them.
    ///
    /// Argument errors and unavailable reranking are reported back to the
    /// model so it can retry; every other tool failure aborts the run.
    ///
    /// # Errors
    ///
    /// - [`RagError::Chat`] if the model answers with neither text nor tool
    ///   calls, or is still calling tools after the round limit
    /// - any error from the [`ChatModel`]
    /// - store and embedding errors raised while retrieving
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        info!(model = self.model.name(), question, "answering question");
        let tools = [ToolDefinition::for_retrieve(&self.tool)];
        let mut messages = vec![
            ChatMessage::System { content: self.system_prompt.clone() },
            ChatMessage::User { content: question.to_string() },
        ];
        let mut retrievals = 0;

        for round in 0..=self.max_tool_rounds {
            let turn = self.model.complete(&messages, &tools).await?;

            if turn.tool_calls.is_empty() {
                let text = turn.content.filter(|text| !text.trim().is_empty()).ok_or_else(|| {
                    error!(round, "model returned an empty reply");
                    RagError::Chat { message: "model returned neither an answer nor a tool call".into() }
                })?;
                info!(round, retrievals, "answer ready");
                return Ok(Answer { text, retrievals });
            }

            if round == self.max_tool_rounds {
                break;
            }

            let calls = turn.tool_calls.clone();
            messages.push(turn.into_message());
            for call in &calls {
                let output = self.run_tool(call).await?;
                if call.function.name == self.tool.name() {
                    retrievals += 1;
                }
                messages.push(ChatMessage::Tool { tool_call_id: call.id.clone(), content: output.to_string() });
            }
            debug!(round, calls = calls.len(), "tool round completed");
        }

        error!(rounds = self.max_tool_rounds, "model kept calling tools");
        Err(RagError::Chat {
            message: format!("no answer after {} rounds of tool calls", self.max_tool_rounds),
        })
    }

    async fn run_tool(&self, call: &ToolCall) -> Result<Value> {
        if call.function.name != self.tool.name() {
            warn!(tool = %call.function.name, "model called an unknown tool");
            return Ok(error_payload(&format!("unknown tool '{}'", call.function.name)));
        }
        let args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => return Ok(error_payload(&e.to_string())),
        };
        match self.tool.execute(args).await {
            Ok(value) => Ok(value),
            Err(e @ (RagError::Configuration(_) | RagError::RerankUnavailable)) => {
                warn!(error = %e, "retrieve call rejected; reporting to model");
                Ok(error_payload(&e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode the model's argument string. An empty string means no arguments.
pub fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| RagError::Configuration(format!("tool arguments are not valid JSON: {e}")))
}

fn error_payload(message: &str) -> Value {
    json!({ "status": "error", "error": message })
}
