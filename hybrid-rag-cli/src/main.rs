use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hybrid_rag::provider::connect_pg_store;
use hybrid_rag::{
    HybridQuery, Metadata, MetadataFilter, RagAgent, RagPipeline, RetrievalResponse, RetrieveTool, Settings,
    build_chat_model, build_embedding_provider, build_reranker,
};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hybrid keyword + semantic retrieval over a pgvector table.
///
/// Connection and provider settings come from the environment (or a `.env`
/// file): `DATABASE_URL` or `DB_*`, `EMBEDDING_SERVICE_TYPE`,
/// `OPENAI_API_KEY`, `OLLAMA_BASE_URL`, `RERANK_API_KEY`, `RERANK`,
/// `CHAT_MODEL`, `CHUNK_SIZE`, ...
#[derive(Parser, Debug)]
#[command(name = "hrag", author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the pgvector extension, chunk table, and indexes
    Init,
    /// Chunk, embed, and store a UTF-8 text or PDF file
    Ingest {
        /// File to ingest
        file: PathBuf,
        /// Document title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Extra metadata as key=value; values are parsed as JSON when possible
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        meta: Vec<(String, Value)>,
    },
    /// Run a hybrid keyword + semantic query
    Search {
        /// Query text
        query: String,
        /// Number of keyword results
        #[arg(long)]
        keyword_k: Option<usize>,
        /// Number of semantic results
        #[arg(long)]
        semantic_k: Option<usize>,
        /// Skip reranking
        #[arg(long)]
        no_rerank: bool,
        /// Number of results kept after reranking
        #[arg(long)]
        top_n: Option<usize>,
        /// Print the retrieval response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer a question with a chat model that searches the table as a tool
    Ask {
        /// The question
        question: String,
        /// Maximum rounds of tool calls before giving up
        #[arg(long, default_value_t = hybrid_rag::agent::DEFAULT_MAX_TOOL_ROUNDS)]
        max_rounds: usize,
    },
    /// Delete every chunk whose metadata matches all conditions
    Delete {
        /// Metadata condition as key=value (repeatable)
        #[arg(long = "where", value_name = "KEY=VALUE", value_parser = parse_key_value, required = true)]
        conditions: Vec<(String, Value)>,
    },
}

/// Parse `key=value`; the value is JSON if it parses, otherwise a string.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn build_pipeline(settings: &Settings) -> anyhow::Result<RagPipeline> {
    let embedding_provider = build_embedding_provider(&settings.embedding)?;
    let reranker = build_reranker(&settings.rerank)?;
    let store = connect_pg_store(settings).await.context("failed to connect to the database")?;

    let pipeline = RagPipeline::builder()
        .config(settings.rag.clone())
        .embedding_provider(embedding_provider)
        .store(Arc::new(store))
        .maybe_reranker(reranker)
        .build()?;
    Ok(pipeline)
}

fn print_results(response: &RetrievalResponse) {
    println!("Found {} results ({:?})", response.total_results, response.search_types);
    for (rank, result) in response.results.iter().enumerate() {
        println!(
            "\n#{} [{}] relevance {:.4} | similarity {:.4} | {}",
            rank + 1,
            result.search_type,
            result.relevance_score,
            result.similarity_score,
            result.title
        );
        println!("   id: {}", result.chunk_id);
        println!("   {}", result.content.replace('\n', " "));
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let pipeline = build_pipeline(&settings).await?;

    match cli.command {
        Commands::Init => {
            pipeline.initialize().await?;
            println!("Initialized table '{}'", settings.table.name);
        }
        Commands::Ingest { file, title, meta } => {
            let metadata: Metadata = meta.into_iter().collect();
            let report = pipeline.ingest_file_titled(&file, title, metadata).await?;
            println!(
                "Ingested {}: {} chunks stored, {} skipped",
                file.display(),
                report.stored.len(),
                report.failed.len()
            );
            for failure in &report.failed {
                eprintln!("  chunk {} skipped: {}", failure.chunk_index, failure.error);
            }
            if report.stored.is_empty() && !report.failed.is_empty() {
                bail!("no chunks of {} could be stored", file.display());
            }
        }
        Commands::Search { query, keyword_k, semantic_k, no_rerank, top_n, json } => {
            let mut request = HybridQuery::from_config(query, pipeline.config());
            request.keyword_k = keyword_k.unwrap_or(request.keyword_k);
            request.semantic_k = semantic_k.unwrap_or(request.semantic_k);
            request.top_n = top_n.unwrap_or(request.top_n);
            request.rerank = request.rerank && !no_rerank;

            let results = pipeline.search(&request).await?;
            let response = RetrievalResponse::new(results);
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_results(&response);
            }
        }
        Commands::Ask { question, max_rounds } => {
            let model = build_chat_model(&settings.chat)?;
            let tool = RetrieveTool::new(Arc::new(pipeline));
            let agent = RagAgent::new(model, tool).with_max_tool_rounds(max_rounds);
            let answer = agent.ask(&question).await?;
            info!(retrievals = answer.retrievals, "question answered");
            println!("{}", answer.text);
        }
        Commands::Delete { conditions } => {
            let filter = MetadataFilter::new(conditions.into_iter().collect())?;
            let deleted = pipeline.delete_where(&filter).await?;
            info!(deleted, "delete completed");
            println!("Deleted {deleted} chunks");
        }
    }
    Ok(())
}
