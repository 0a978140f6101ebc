//! Tests for hybrid retrieval: merge order, deduplication, reranking, and failures.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hybrid_rag::document::{Chunk, Metadata, ScoredChunk, SearchType};
use hybrid_rag::embedding::EmbeddingProvider;
use hybrid_rag::error::{RagError, Result};
use hybrid_rag::inmemory::InMemoryChunkStore;
use hybrid_rag::reranker::{KeywordOverlapReranker, RerankHit, Reranker};
use hybrid_rag::retriever::HybridRetriever;
use hybrid_rag::store::{ChunkStore, MetadataFilter};
use proptest::prelude::*;

const DIM: usize = 8;

/// Hashes words into a fixed number of buckets.
struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; DIM];
        for word in text.split_whitespace() {
            let bucket = word.bytes().map(usize::from).sum::<usize>() % DIM;
            v[bucket] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingService { provider: "test".into(), message: "offline".into() })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// A store returning canned result lists and counting calls.
#[derive(Default)]
struct ScriptedStore {
    keyword: Vec<ScoredChunk>,
    semantic: Vec<ScoredChunk>,
    fail_keyword: bool,
    fail_semantic: bool,
    keyword_calls: AtomicUsize,
    semantic_calls: AtomicUsize,
}

impl ScriptedStore {
    fn new(keyword: Vec<ScoredChunk>, semantic: Vec<ScoredChunk>) -> Self {
        Self { keyword, semantic, ..Default::default() }
    }

    fn calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst) + self.semantic_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for ScriptedStore {
    async fn initialize(&self, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _chunk: &Chunk) -> Result<()> {
        Ok(())
    }

    async fn keyword_search(&self, _query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_keyword {
            return Err(RagError::Store { backend: "scripted".into(), message: "connection reset".into() });
        }
        Ok(self.keyword.iter().take(limit).cloned().collect())
    }

    async fn semantic_search(&self, _embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        self.semantic_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_semantic {
            return Err(RagError::Store { backend: "scripted".into(), message: "connection reset".into() });
        }
        Ok(self.semantic.iter().take(limit).cloned().collect())
    }

    async fn delete_where(&self, _filter: &MetadataFilter) -> Result<u64> {
        Ok(0)
    }
}

/// A reranker returning fixed hits and counting calls.
struct ScriptedReranker {
    hits: Vec<RerankHit>,
    calls: AtomicUsize,
}

#[async_trait]
impl Reranker for ScriptedReranker {
    async fn rerank(&self, _query: &str, _documents: &[&str], _top_n: usize) -> Result<Vec<RerankHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

fn chunk(id: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        document_id: "doc".to_string(),
        title: "The Necklace".to_string(),
        content: content.to_string(),
        metadata: Metadata::new(),
        embedding: Vec::new(),
    }
}

fn scored(id: &str, score: f32) -> ScoredChunk {
    ScoredChunk { chunk: chunk(id, &format!("content of {id}")), score }
}

fn retriever(store: Arc<dyn ChunkStore>) -> HybridRetriever {
    HybridRetriever::new(Arc::new(BagOfWordsEmbedder), store)
}

#[tokio::test]
async fn chunk_found_by_both_searches_appears_once_as_keyword() {
    let store = Arc::new(InMemoryChunkStore::new());
    store.initialize(DIM).await.unwrap();
    let embedder = BagOfWordsEmbedder;
    for (id, content) in [
        ("necklace", "Mathilde borrowed a diamond necklace"),
        ("ball", "the ball at the ministry was splendid"),
        ("paste", "the jewels were paste worth five hundred francs"),
    ] {
        let mut c = chunk(id, content);
        c.embedding = embedder.embed(content).await.unwrap();
        store.upsert(&c).await.unwrap();
    }

    let results = retriever(store).hybrid_search("diamond necklace", 5, 5, false, 5).await.unwrap();

    let necklace: Vec<_> = results.iter().filter(|r| r.chunk_id == "necklace").collect();
    assert_eq!(necklace.len(), 1);
    assert_eq!(necklace[0].search_type, SearchType::Keyword);

    let ids: HashSet<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids.len(), results.len());
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn first_occurrence_keeps_its_keyword_score() {
    let store = Arc::new(ScriptedStore::new(
        vec![scored("shared", 0.2)],
        vec![scored("shared", 0.95), scored("semantic-only", 0.5)],
    ));
    let results = retriever(store).hybrid_search("q", 5, 5, false, 5).await.unwrap();

    assert_eq!(results.len(), 2);
    let shared = results.iter().find(|r| r.chunk_id == "shared").unwrap();
    assert_eq!(shared.search_type, SearchType::Keyword);
    assert_eq!(shared.similarity_score, 0.2);
}

#[tokio::test]
async fn rerank_without_reranker_is_unavailable() {
    let store = Arc::new(ScriptedStore::new(vec![scored("a", 1.0)], vec![scored("b", 0.5)]));
    let err = retriever(store.clone()).hybrid_search("q", 5, 5, true, 3).await.unwrap_err();

    assert!(matches!(err, RagError::RerankUnavailable));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn keyword_store_failure_is_a_retrieval_error() {
    let store = Arc::new(ScriptedStore {
        fail_keyword: true,
        semantic: vec![scored("b", 0.5)],
        ..Default::default()
    });
    let err = retriever(store).hybrid_search("q", 5, 5, false, 5).await.unwrap_err();
    assert!(matches!(err, RagError::Retrieval { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn semantic_store_failure_is_a_retrieval_error() {
    let store = Arc::new(ScriptedStore {
        keyword: vec![scored("a", 1.0)],
        fail_semantic: true,
        ..Default::default()
    });
    let err = retriever(store).hybrid_search("q", 5, 5, false, 5).await.unwrap_err();
    assert!(matches!(err, RagError::Retrieval { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn query_embedding_of_wrong_width_is_a_retrieval_error() {
    let store = Arc::new(InMemoryChunkStore::new());
    store.initialize(DIM + 1).await.unwrap();
    let err = retriever(store).hybrid_search("necklace", 0, 5, false, 5).await.unwrap_err();
    assert!(matches!(err, RagError::Retrieval { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn query_embedding_failure_is_propagated() {
    let store = Arc::new(ScriptedStore::new(vec![scored("a", 1.0)], Vec::new()));
    let err = HybridRetriever::new(Arc::new(FailingEmbedder), store.clone())
        .hybrid_search("q", 5, 5, false, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService { .. }));
    assert_eq!(store.semantic_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_budget_skips_that_search() {
    let store = Arc::new(ScriptedStore::new(vec![scored("a", 1.0)], vec![scored("b", 0.5)]));
    let results = HybridRetriever::new(Arc::new(FailingEmbedder), store.clone())
        .hybrid_search("q", 5, 0, false, 5)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(store.semantic_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn without_rerank_relevance_equals_similarity_and_is_sorted() {
    let store = Arc::new(ScriptedStore::new(
        vec![scored("k1", 0.1), scored("k2", 0.7)],
        vec![scored("s1", 0.9), scored("s2", 0.7)],
    ));
    let results = retriever(store).hybrid_search("q", 5, 5, false, 1).await.unwrap();

    // top_n only applies when reranking
    assert_eq!(results.len(), 4);
    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "k2", "s2", "k1"]);
    for result in &results {
        assert_eq!(result.relevance_score, result.similarity_score);
    }
}

#[tokio::test]
async fn rerank_keeps_top_n_with_reranker_scores() {
    let store = Arc::new(ScriptedStore::new(
        vec![ScoredChunk { chunk: chunk("ball", "the ball at the ministry"), score: 0.3 }],
        vec![
            ScoredChunk { chunk: chunk("necklace", "a diamond necklace was lost"), score: 0.8 },
            ScoredChunk { chunk: chunk("paste", "the necklace was paste"), score: 0.6 },
        ],
    ));
    let results = retriever(store)
        .with_reranker(Arc::new(KeywordOverlapReranker))
        .hybrid_search("diamond necklace", 5, 5, true, 2)
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["necklace", "paste"]);
    assert_eq!(results[0].relevance_score, 1.0);
    assert_eq!(results[0].similarity_score, 0.8);
    assert_eq!(results[1].relevance_score, 0.5);
    assert_eq!(results[1].search_type, SearchType::Semantic);
}

#[tokio::test]
async fn rerank_result_order_follows_relevance() {
    let store = Arc::new(ScriptedStore::new(vec![scored("a", 0.9)], vec![scored("b", 0.1)]));
    let reranker = Arc::new(ScriptedReranker {
        hits: vec![
            RerankHit { index: 0, relevance_score: 0.2 },
            RerankHit { index: 1, relevance_score: 0.7 },
        ],
        calls: AtomicUsize::new(0),
    });
    let results = retriever(store).with_reranker(reranker).hybrid_search("q", 5, 5, true, 5).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn reranker_index_out_of_range_is_an_error() {
    let store = Arc::new(ScriptedStore::new(vec![scored("a", 0.9)], Vec::new()));
    let reranker = Arc::new(ScriptedReranker {
        hits: vec![RerankHit { index: 4, relevance_score: 0.9 }],
        calls: AtomicUsize::new(0),
    });
    let err = retriever(store).with_reranker(reranker).hybrid_search("q", 5, 5, true, 5).await.unwrap_err();
    assert!(matches!(err, RagError::Reranker { .. }));
}

#[tokio::test]
async fn reranker_is_not_called_without_candidates() {
    let store = Arc::new(ScriptedStore::default());
    let reranker = Arc::new(ScriptedReranker { hits: Vec::new(), calls: AtomicUsize::new(0) });
    let results =
        retriever(store).with_reranker(reranker.clone()).hybrid_search("q", 5, 5, true, 5).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn nan_scores_do_not_break_ranking() {
    let store = Arc::new(ScriptedStore::new(
        vec![scored("k", f32::NAN)],
        vec![scored("s1", 0.4), scored("s2", f32::NAN), scored("s3", 0.9)],
    ));
    let results = retriever(store.clone()).hybrid_search("q", 5, 5, false, 5).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["s3", "s1", "k", "s2"]);

    let reranker = Arc::new(ScriptedReranker {
        hits: vec![
            RerankHit { index: 0, relevance_score: f32::NAN },
            RerankHit { index: 1, relevance_score: 0.3 },
        ],
        calls: AtomicUsize::new(0),
    });
    let reranked = retriever(store).with_reranker(reranker).hybrid_search("q", 5, 5, true, 5).await.unwrap();
    let ids: Vec<&str> = reranked.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "k"]);
}

fn arb_hits() -> impl Strategy<Value = Vec<(String, f32)>> {
    proptest::collection::vec(("[a-f]", 0.0f32..1.0f32), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Results hold each chunk id once, tagged keyword whenever keyword
    /// search found it, with pass-through scores in descending order.
    #[test]
    fn merged_results_are_unique_keyword_first_and_sorted(
        keyword in arb_hits(),
        semantic in arb_hits(),
    ) {
        let keyword_ids: HashSet<String> = keyword.iter().map(|(id, _)| id.clone()).collect();
        let all_ids: HashSet<String> =
            keyword.iter().chain(semantic.iter()).map(|(id, _)| id.clone()).collect();

        let store = Arc::new(ScriptedStore::new(
            keyword.iter().map(|(id, score)| scored(id, *score)).collect(),
            semantic.iter().map(|(id, score)| scored(id, *score)).collect(),
        ));

        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(retriever(store).hybrid_search("q", 10, 10, false, 10)).unwrap();

        let ids: HashSet<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
        prop_assert_eq!(ids.len(), results.len());
        prop_assert_eq!(&ids, &all_ids);

        for result in &results {
            let expected = if keyword_ids.contains(&result.chunk_id) {
                SearchType::Keyword
            } else {
                SearchType::Semantic
            };
            prop_assert_eq!(result.search_type, expected);
            prop_assert_eq!(result.relevance_score, result.similarity_score);
        }
        for window in results.windows(2) {
            prop_assert!(window[0].relevance_score >= window[1].relevance_score);
        }
    }
}
