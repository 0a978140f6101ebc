//! Deployment settings loaded from the environment.
//!
//! Secrets (API keys, database passwords) have no defaults; they must be
//! supplied by the environment at deployment time.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | built from `DB_*` |
//! | `DB_HOST` / `DB_PORT` / `DB_NAME` / `DB_USER` / `DB_PASSWORD` | `localhost` / `5432` / `postgres` / `postgres` / none |
//! | `DB_MAX_CONNECTIONS` | `5` |
//! | `TABLE_NAME` | `documents` |
//! | `TEXT_SEARCH_CONFIG` | `simple` |
//! | `DISTANCE_METRIC` | `cosine` |
//! | `VECTOR_INDEX` / `IVFFLAT_LISTS` | `ivfflat` / `100` |
//! | `EMBEDDING_SERVICE_TYPE` | `openai` |
//! | `OPENAI_API_KEY` / `OPENAI_MODEL` / `OPENAI_BASE_URL` | none / `text-embedding-ada-002` / OpenAI |
//! | `OLLAMA_BASE_URL` / `OLLAMA_MODEL` | `http://localhost:11434` / `nomic-embed-text` |
//! | `EMBEDDING_DIMENSION` | provider default |
//! | `RERANK_API_KEY` / `RERANK_BASE_URL` / `RERANK_MODEL` | none |
//! | `RERANK` | `true` when `RERANK_API_KEY` is set, else `false` |
//! | `CHAT_API_KEY` / `CHAT_BASE_URL` / `CHAT_MODEL` | `OPENAI_API_KEY` / `OPENAI_BASE_URL` / `gpt-4o-mini` |
//! | `CHUNK_SIZE` / `CHUNK_OVERLAP` | `500` / `50` |

#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::store::{DistanceMetric, VectorIndex};

/// The closed set of supported embedding services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// An OpenAI-compatible `/embeddings` API.
    #[default]
    OpenAi,
    /// A local Ollama server.
    Ollama,
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingBackend::OpenAi => write!(f, "openai"),
            EmbeddingBackend::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingBackend::OpenAi),
            "ollama" => Ok(EmbeddingBackend::Ollama),
            other => Err(RagError::Configuration(format!(
                "unsupported embedding service: {other}; supported types are 'openai' and 'ollama'"
            ))),
        }
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password, if the server requires one.
    pub password: Option<String>,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl DatabaseSettings {
    /// The connection URL, built from the individual fields when no URL is set.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.database
            ),
            None => format!("postgres://{}@{}:{}/{}", self.user, self.host, self.port, self.database),
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Chunk table settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Table holding the chunks.
    pub name: String,
    /// PostgreSQL text search configuration used by `to_tsvector`.
    pub text_search_config: String,
    /// Vector similarity metric.
    pub metric: DistanceMetric,
    /// Approximate nearest-neighbour index built on the embedding column.
    pub index: VectorIndex,
}

/// Embedding service settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Which embedding service to call.
    pub backend: EmbeddingBackend,
    /// API key for the OpenAI-compatible service.
    pub openai_api_key: Option<String>,
    /// OpenAI embedding model; the provider default when unset.
    pub openai_model: Option<String>,
    /// Base URL of the OpenAI-compatible API; the public endpoint when unset.
    pub openai_base_url: Option<String>,
    /// Base URL of the Ollama server.
    pub ollama_base_url: Option<String>,
    /// Ollama embedding model.
    pub ollama_model: Option<String>,
    /// Overrides the provider's default dimensionality.
    pub dimensions: Option<usize>,
}

impl fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("backend", &self.backend)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Hosted reranker settings. Reranking is unavailable without an API key.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankSettings {
    /// API key for the rerank service.
    pub api_key: Option<String>,
    /// Base URL of the rerank service.
    pub base_url: Option<String>,
    /// Rerank model name.
    pub model: Option<String>,
}

impl fmt::Debug for RerankSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerankSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Chat completion settings for question answering.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// API key for the OpenAI-compatible chat service.
    pub api_key: Option<String>,
    /// Base URL of the chat service; the public OpenAI endpoint when unset.
    pub base_url: Option<String>,
    /// Chat model name.
    pub model: String,
}

impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// All deployment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// PostgreSQL connection.
    pub database: DatabaseSettings,
    /// Chunk table layout.
    pub table: TableSettings,
    /// Embedding service.
    pub embedding: EmbeddingSettings,
    /// Hosted reranker.
    pub rerank: RerankSettings,
    /// Chat model used to answer questions.
    pub chat: ChatSettings,
    /// Chunking and default query budgets.
    pub rag: RagConfig,
}

impl Settings {
    /// Load settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a variable cannot be parsed or
    /// the chunk sizing is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database = DatabaseSettings {
            url: var("DATABASE_URL"),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&var, "DB_PORT", 5432)?,
            database: var("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
            user: var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: var("DB_PASSWORD"),
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 5)?,
        };

        let index = match var("VECTOR_INDEX") {
            Some(kind) => match kind.parse::<VectorIndex>()? {
                VectorIndex::IvfFlat { .. } => {
                    VectorIndex::IvfFlat { lists: parse_or(&var, "IVFFLAT_LISTS", 100)? }
                }
                other => other,
            },
            None => VectorIndex::IvfFlat { lists: parse_or(&var, "IVFFLAT_LISTS", 100)? },
        };
        let table = TableSettings {
            name: var("TABLE_NAME").unwrap_or_else(|| "documents".to_string()),
            text_search_config: var("TEXT_SEARCH_CONFIG").unwrap_or_else(|| "simple".to_string()),
            metric: parse_or(&var, "DISTANCE_METRIC", DistanceMetric::Cosine)?,
            index,
        };

        let embedding = EmbeddingSettings {
            backend: parse_or(&var, "EMBEDDING_SERVICE_TYPE", EmbeddingBackend::OpenAi)?,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL"),
            openai_base_url: var("OPENAI_BASE_URL"),
            ollama_base_url: var("OLLAMA_BASE_URL"),
            ollama_model: var("OLLAMA_MODEL"),
            dimensions: parse_opt(&var, "EMBEDDING_DIMENSION")?,
        };

        let rerank = RerankSettings {
            api_key: var("RERANK_API_KEY"),
            base_url: var("RERANK_BASE_URL"),
            model: var("RERANK_MODEL"),
        };

        let chat = ChatSettings {
            api_key: var("CHAT_API_KEY").or_else(|| embedding.openai_api_key.clone()),
            base_url: var("CHAT_BASE_URL").or_else(|| embedding.openai_base_url.clone()),
            model: var("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        };

        let defaults = RagConfig::default();
        let rag = RagConfig::builder()
            .chunk_size(parse_or(&var, "CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse_or(&var, "CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .rerank(parse_or(&var, "RERANK", rerank.api_key.is_some())?)
            .build()?;

        Ok(Self { database, table, embedding, rerank, chat, rag })
    }
}

fn parse_opt<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RagError::Configuration(format!("invalid value for {key} ('{raw}'): {e}")))
        })
        .transpose()
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}
