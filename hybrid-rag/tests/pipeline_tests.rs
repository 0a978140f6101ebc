//! End-to-end pipeline tests over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hybrid_rag::config::RagConfig;
use hybrid_rag::document::{Document, Metadata};
use hybrid_rag::embedding::EmbeddingProvider;
use hybrid_rag::error::{RagError, Result};
use hybrid_rag::inmemory::InMemoryChunkStore;
use hybrid_rag::pipeline::{FILE_NAME_KEY, RagPipeline};
use hybrid_rag::reranker::KeywordOverlapReranker;
use hybrid_rag::store::MetadataFilter;
use hybrid_rag::tool::{RetrievalResponse, RetrieveTool};
use serde_json::json;

const DIM: usize = 8;

/// Hashes words into buckets. Fails for text containing `poison` and
/// returns a vector of the wrong width for text containing `wide`.
#[derive(Default)]
struct FlakyEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("poison") {
            return Err(RagError::EmbeddingService { provider: "flaky".into(), message: "rate limited".into() });
        }
        let width = if text.contains("wide") { DIM + 1 } else { DIM };
        let mut v = vec![0.0; width];
        for word in text.split_whitespace() {
            v[word.len() % DIM] += 1.0;
        }
        v[0] += 0.01;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn config(chunk_size: usize, chunk_overlap: usize) -> RagConfig {
    RagConfig::builder().chunk_size(chunk_size).chunk_overlap(chunk_overlap).rerank(false).build().unwrap()
}

async fn pipeline(config: RagConfig, store: Arc<InMemoryChunkStore>) -> RagPipeline {
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(FlakyEmbedder::default()))
        .store(store)
        .build()
        .unwrap();
    pipeline.initialize().await.unwrap();
    pipeline
}

#[tokio::test]
async fn failing_chunk_is_skipped_and_the_rest_are_stored() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(10, 0), store.clone()).await;

    // Three 10-character chunks; the middle one cannot be embedded.
    let document = Document::new("doc", "t", "aaaa bbbb poison cc dddd eeee");
    let report = pipeline.ingest(&document).await;

    assert_eq!(report.document_id, "doc");
    assert_eq!(report.stored.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].chunk_index, 1);
    assert!(report.failed[0].error.contains("rate limited"));
    assert!(!report.is_complete());
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn store_write_failure_is_also_skipped() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(10, 0), store.clone()).await;

    let report = pipeline.ingest(&Document::new("doc", "t", "wide chunkclean text")).await;
    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].chunk_index, 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn ingest_batch_reports_each_document() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(100, 10), store.clone()).await;

    let reports = pipeline
        .ingest_batch(&[Document::new("one", "t", "first document"), Document::new("two", "t", "second")])
        .await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_complete()));
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn ingest_file_records_file_name_and_delete_file_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("necklace.txt");
    tokio::fs::write(&path, "Mathilde borrowed a diamond necklace from Madame Forestier.").await.unwrap();

    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(20, 5), store.clone()).await;

    let mut metadata = Metadata::new();
    metadata.insert("author".into(), json!("Maupassant"));
    let report = pipeline.ingest_file(&path, metadata).await.unwrap();
    assert!(report.is_complete());
    let stored = store.len().await;
    assert!(stored > 1);

    let results = pipeline.query("necklace").await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.title == "necklace.txt"));
    assert!(results.iter().all(|r| r.metadata[FILE_NAME_KEY] == "necklace.txt"));
    assert!(results.iter().all(|r| r.metadata["author"] == "Maupassant"));

    let deleted = pipeline.delete_file("necklace.txt").await.unwrap();
    assert_eq!(deleted as usize, stored);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn ingest_file_titled_overrides_the_title() {
    let file = tempfile::Builder::new().prefix("hybrid-rag-").suffix(".txt").tempfile().unwrap();
    let path = file.path();
    tokio::fs::write(path, "a short story").await.unwrap();

    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(100, 10), store).await;
    pipeline.ingest_file_titled(path, Some("The Necklace".into()), Metadata::new()).await.unwrap();

    let results = pipeline.query("story").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "The Necklace");
    assert!(results[0].metadata[FILE_NAME_KEY].as_str().unwrap().starts_with("hybrid-rag-"));
}

/// A one-page PDF showing `text` in Helvetica, with a correct xref table.
#[cfg(feature = "pdf")]
fn one_page_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}

#[cfg(feature = "pdf")]
#[tokio::test]
async fn ingest_pdf_extracts_its_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("necklace.pdf");
    tokio::fs::write(&path, one_page_pdf("Mathilde lost the diamond necklace")).await.unwrap();

    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(200, 20), store.clone()).await;
    let report = pipeline.ingest_file(&path, Metadata::new()).await.unwrap();
    assert!(report.is_complete());
    assert!(!report.stored.is_empty());

    let results = pipeline.query("necklace").await.unwrap();
    assert!(!results.is_empty());
    assert!(results[0].content.contains("necklace"));
    assert_eq!(results[0].metadata[FILE_NAME_KEY], "necklace.pdf");
}

#[cfg(feature = "pdf")]
#[tokio::test]
async fn corrupt_pdf_is_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.PDF");
    tokio::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body").await.unwrap();

    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(200, 20), store.clone()).await;
    let err = pipeline.ingest_file(&path, Metadata::new()).await.unwrap_err();
    assert!(matches!(err, RagError::Extraction { .. }), "unexpected error: {err:?}");
    assert!(store.is_empty().await);
}

#[cfg(not(feature = "pdf"))]
#[tokio::test]
async fn pdf_without_feature_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("necklace.pdf");
    tokio::fs::write(&path, b"%PDF-1.4\n").await.unwrap();

    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(200, 20), store.clone()).await;
    let err = pipeline.ingest_file(&path, Metadata::new()).await.unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)), "unexpected error: {err:?}");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn ingest_missing_file_is_an_io_error() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(20, 5), store).await;
    let err = pipeline.ingest_file("/definitely/not/here.txt", Metadata::new()).await.unwrap_err();
    assert!(matches!(err, RagError::Io(_)));
}

#[tokio::test]
async fn delete_where_matches_every_condition() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(config(100, 10), store.clone()).await;
    pipeline.ingest(&Document::new("a", "t", "alpha").with_metadata("lang", "en").with_metadata("v", 1)).await;
    pipeline.ingest(&Document::new("b", "t", "beta").with_metadata("lang", "en").with_metadata("v", 2)).await;

    let filter = MetadataFilter::where_eq("lang", "en").and("v", 2);
    assert_eq!(pipeline.delete_where(&filter).await.unwrap(), 1);
    assert_eq!(store.len().await, 1);
}

#[test]
fn builder_requires_store_and_provider() {
    let err = RagPipeline::builder().config(RagConfig::default()).build().err().unwrap();
    assert!(matches!(err, RagError::Configuration(_)));
}

#[tokio::test]
async fn default_rerank_without_reranker_fails_query() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline(RagConfig::default(), store).await;
    pipeline.ingest(&Document::new("a", "t", "some text")).await;
    assert!(matches!(pipeline.query("text").await, Err(RagError::RerankUnavailable)));
}

#[tokio::test]
async fn retrieve_tool_returns_response_payload() {
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(FlakyEmbedder::default()))
        .store(store)
        .reranker(Arc::new(KeywordOverlapReranker))
        .build()
        .unwrap();
    pipeline.initialize().await.unwrap();
    pipeline.ingest(&Document::new("a", "Story", "the diamond necklace was paste")).await;
    pipeline.ingest(&Document::new("b", "Story", "the ball at the ministry")).await;

    let tool = RetrieveTool::new(Arc::new(pipeline));
    assert_eq!(tool.name(), "retrieve");
    assert_eq!(tool.parameters_schema()["required"], json!(["query"]));

    let value = tool.execute(json!({ "query": "diamond necklace", "top_n": 1 })).await.unwrap();
    let response: RetrievalResponse = serde_json::from_value(value).unwrap();

    assert_eq!(response.status, "success");
    assert_eq!(response.total_results, 1);
    assert!(!response.results[0].chunk_id.is_empty());
    assert!(response.results[0].content.contains("necklace"));
    assert_eq!(response.search_types, vec![response.results[0].search_type]);
}

#[tokio::test]
async fn retrieve_tool_parses_and_validates_arguments() {
    let store = Arc::new(InMemoryChunkStore::new());
    let tool = RetrieveTool::new(Arc::new(pipeline(config(100, 10), store).await));

    let parsed = tool.parse_args(&json!({ "query": "q", "keyword_k": 2, "rerank": true })).unwrap();
    assert_eq!(parsed.keyword_k, 2);
    assert_eq!(parsed.semantic_k, 5);
    assert!(parsed.rerank);
    assert_eq!(parsed.top_n, 5);

    assert!(matches!(tool.parse_args(&json!({})), Err(RagError::Configuration(_))));
    assert!(matches!(tool.parse_args(&json!({ "query": "q", "top_n": -1 })), Err(RagError::Configuration(_))));
    assert!(matches!(tool.parse_args(&json!({ "query": "q", "rerank": "yes" })), Err(RagError::Configuration(_))));
    assert!(matches!(tool.parse_args(&json!({ "query": "q", "top_n": u64::MAX })), Err(RagError::Configuration(_))));
    assert!(matches!(
        tool.parse_args(&json!({ "query": "q", "keyword_k": i64::MAX as u64 + 1 })),
        Err(RagError::Configuration(_))
    ));
    assert_eq!(tool.parse_args(&json!({ "query": "q", "semantic_k": 1_000_000 })).unwrap().semantic_k, 1_000_000);

    let response = tool.execute(json!({ "query": "anything", "rerank": false })).await.unwrap();
    assert_eq!(response["total_results"], 0);
    assert_eq!(response["search_types"], json!([]));
}
