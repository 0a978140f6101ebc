//! Construct backends from [`Settings`](crate::settings::Settings).
//!
//! Each factory matches on a closed set of choices. A choice whose cargo
//! feature is disabled is reported as a configuration error rather than
//! silently falling back to another backend.

use std::sync::Arc;

use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::agent::ChatModel;
use crate::settings::{ChatSettings, EmbeddingBackend, EmbeddingSettings, RerankSettings};

/// Build the embedding provider selected by `settings.backend`.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if the backend's feature is disabled
/// or a required setting (such as the OpenAI API key) is missing.
pub fn build_embedding_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = match settings.backend {
        EmbeddingBackend::OpenAi => openai_provider(settings)?,
        EmbeddingBackend::Ollama => ollama_provider(settings)?,
    };
    info!(
        backend = %settings.backend,
        provider = provider.name(),
        dimensions = provider.dimensions(),
        "embedding provider ready"
    );
    Ok(provider)
}

#[cfg(feature = "openai")]
fn openai_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    use crate::openai::OpenAIEmbeddingProvider;

    let api_key = settings.openai_api_key.as_deref().ok_or_else(|| {
        RagError::Configuration("OPENAI_API_KEY must be set when EMBEDDING_SERVICE_TYPE=openai".into())
    })?;
    let mut provider = OpenAIEmbeddingProvider::new(api_key)?;
    if let Some(base_url) = &settings.openai_base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(model) = &settings.openai_model {
        provider = provider.with_model(model);
    }
    if let Some(dims) = settings.dimensions {
        provider = provider.with_expected_dimensions(dims);
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_provider(_settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(RagError::Configuration("the openai embedding backend requires the `openai` feature".into()))
}

#[cfg(feature = "ollama")]
fn ollama_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    use crate::ollama::OllamaEmbeddingProvider;

    let mut provider = match &settings.ollama_base_url {
        Some(base_url) => OllamaEmbeddingProvider::new(base_url),
        None => OllamaEmbeddingProvider::default(),
    };
    if let Some(model) = &settings.ollama_model {
        provider = provider.with_model(model);
    }
    if let Some(dims) = settings.dimensions {
        provider = provider.with_dimensions(dims);
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "ollama"))]
fn ollama_provider(_settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(RagError::Configuration("the ollama embedding backend requires the `ollama` feature".into()))
}

/// Build the hosted reranker, or `None` when no API key is configured.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if a key is set but the
/// `http-reranker` feature is disabled.
pub fn build_reranker(settings: &RerankSettings) -> Result<Option<Arc<dyn Reranker>>> {
    let Some(api_key) = settings.api_key.as_deref() else {
        info!("no rerank API key configured; reranking unavailable");
        return Ok(None);
    };
    http_reranker(api_key, settings).map(Some)
}

#[cfg(feature = "http-reranker")]
fn http_reranker(api_key: &str, settings: &RerankSettings) -> Result<Arc<dyn Reranker>> {
    use crate::http_reranker::HttpReranker;

    let mut reranker = HttpReranker::new(api_key)?;
    if let Some(base_url) = &settings.base_url {
        reranker = reranker.with_base_url(base_url);
    }
    if let Some(model) = &settings.model {
        reranker = reranker.with_model(model);
    }
    Ok(Arc::new(reranker))
}

#[cfg(not(feature = "http-reranker"))]
fn http_reranker(_api_key: &str, _settings: &RerankSettings) -> Result<Arc<dyn Reranker>> {
    Err(RagError::Configuration("RERANK_API_KEY is set but the `http-reranker` feature is disabled".into()))
}

/// Build the chat model used to answer questions.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if no API key is configured or the
/// `openai` feature is disabled.
pub fn build_chat_model(settings: &ChatSettings) -> Result<Arc<dyn ChatModel>> {
    let api_key = settings.api_key.as_deref().ok_or_else(|| {
        RagError::Configuration("CHAT_API_KEY or OPENAI_API_KEY must be set to answer questions".into())
    })?;
    let model = openai_chat_model(api_key, settings)?;
    info!(model = model.name(), "chat model ready");
    Ok(model)
}

#[cfg(feature = "openai")]
fn openai_chat_model(api_key: &str, settings: &ChatSettings) -> Result<Arc<dyn ChatModel>> {
    use crate::chat::OpenAIChatModel;

    let mut model = OpenAIChatModel::new(api_key)?.with_model(&settings.model);
    if let Some(base_url) = &settings.base_url {
        model = model.with_base_url(base_url);
    }
    Ok(Arc::new(model))
}

#[cfg(not(feature = "openai"))]
fn openai_chat_model(_api_key: &str, _settings: &ChatSettings) -> Result<Arc<dyn ChatModel>> {
    Err(RagError::Configuration("question answering requires the `openai` feature".into()))
}

/// Connect the pgvector store described by `settings`.
#[cfg(feature = "pgvector")]
pub async fn connect_pg_store(settings: &crate::settings::Settings) -> Result<crate::pgvector::PgChunkStore> {
    use crate::pgvector::{PgChunkStore, PgStoreOptions};

    let options = PgStoreOptions {
        table: settings.table.name.clone(),
        text_search_config: settings.table.text_search_config.clone(),
        metric: settings.table.metric,
        index: settings.table.index,
        max_connections: settings.database.max_connections,
    };
    info!(
        table = %options.table,
        metric = %options.metric,
        host = %settings.database.host,
        "connecting to pgvector store"
    );
    PgChunkStore::connect(&settings.database.connection_url(), options).await
}
