use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::llm::cross_encoder::Reranker;
use crate::llm::embeddings::Embedder;
use crate::models::{RetrievalStage, SearchResult};
use crate::search::bm25::{Bm25Hit, LexicalCache};
use crate::search::hybrid::{rrf_fusion, FusedCandidate};
use crate::search::vector::{ChunkStore, VectorHit};

/// Query pipeline over the committed index:
///
/// 1. semantic candidates by cosine similarity (`top_k * vector_multiplier`)
/// 2. lexical candidates from the cached BM25 index (`top_k * bm25_multiplier`)
/// 3. reciprocal rank fusion, capped at `top_k * fusion_multiplier`
/// 4. cross-encoder reranking, when a reranker is configured
/// 5. the first `top_k`
///
/// Either retrieval signal may drop out with a warning; only losing both
/// fails the query.
pub struct HybridSearchEngine {
    config: SearchConfig,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    lexical: Arc<LexicalCache>,
}

impl HybridSearchEngine {
    pub fn new(
        config: SearchConfig,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        lexical: Arc<LexicalCache>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            reranker,
            lexical,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.config.default_top_k
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.store.stats().is_none() {
            return Err(Error::IndexNotReady);
        }

        let query = query.trim();
        if query.is_empty() || top_k == 0 || self.store.is_empty() {
            return Ok(Vec::new());
        }

        // Pools never exceed the store, whatever the caller asked for
        let available = self.store.len();
        let pool = |multiplier: usize| top_k.saturating_mul(multiplier).min(available);

        let semantic = self.semantic_candidates(query, pool(self.config.vector_multiplier));
        if let Err(e) = &semantic {
            tracing::warn!("{e}; continuing with lexical results only");
        }

        let lexical = self.lexical_candidates(query, pool(self.config.bm25_multiplier));
        if let Err(e) = &lexical {
            tracing::warn!("{e}; continuing with semantic results only");
        }

        let (stage, semantic_hits, lexical_hits) = match (semantic, lexical) {
            (Ok(s), Ok(l)) => (RetrievalStage::Fused, s, l),
            (Ok(s), Err(_)) => (RetrievalStage::Semantic, s, Vec::new()),
            (Err(_), Ok(l)) => (RetrievalStage::Lexical, Vec::new(), l),
            (Err(semantic_err), Err(lexical_err)) => {
                return Err(Error::retrieval(
                    "hybrid",
                    format!("{semantic_err}; {lexical_err}"),
                ));
            }
        };

        tracing::debug!(
            "Query {query:?}: {} semantic, {} lexical candidates",
            semantic_hits.len(),
            lexical_hits.len()
        );

        let fused = rrf_fusion(
            semantic_hits,
            lexical_hits,
            self.config.rrf_k,
            pool(self.config.fusion_multiplier),
        );

        let mut results = self.rerank(query, fused, stage);
        results.truncate(top_k);
        Ok(results)
    }

    fn semantic_candidates(&self, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        let embedding = self
            .embedder
            .embed_query(query)
            .map_err(|e| Error::retrieval("semantic", format!("{e:#}")))?;
        if let Some(indexed) = self.store.dim() {
            if embedding.len() != indexed {
                return Err(Error::retrieval(
                    "semantic",
                    format!(
                        "query embedding has {} dimensions but the index holds {indexed}; refresh the index",
                        embedding.len()
                    ),
                ));
            }
        }
        Ok(self.store.search(&embedding, limit))
    }

    fn lexical_candidates(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
        if !self.config.lexical_enabled {
            return Err(Error::retrieval("lexical", "disabled by configuration"));
        }

        let index = self
            .lexical
            .get_or_build(self.store.version(), || self.store.chunks())
            .map_err(|e| Error::retrieval("lexical", format!("{e:#}")))?;
        index
            .search(query, limit)
            .map_err(|e| Error::retrieval("lexical", format!("{e:#}")))
    }

    /// Order candidates by cross-encoder score. A missing or failing reranker
    /// leaves the fused order untouched.
    fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedCandidate>,
        stage: RetrievalStage,
    ) -> Vec<SearchResult> {
        let scores = match &self.reranker {
            Some(reranker) if !candidates.is_empty() => {
                let documents: Vec<String> = candidates
                    .iter()
                    .map(|c| c.chunk.retrieval_text())
                    .collect();
                match reranker.score(query, &documents) {
                    Ok(scores) if scores.len() == candidates.len() => Some(scores),
                    Ok(scores) => {
                        tracing::warn!(
                            "Reranker returned {} scores for {} candidates; keeping fused order",
                            scores.len(),
                            candidates.len()
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Reranking failed, keeping fused order: {e:#}");
                        None
                    }
                }
            }
            _ => None,
        };

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let rerank_score = scores.as_ref().map(|s| s[i]);
                SearchResult {
                    matched_both: c.matched_both(),
                    score: rerank_score.unwrap_or(c.fused_score),
                    stage: if rerank_score.is_some() {
                        RetrievalStage::Reranked
                    } else {
                        stage
                    },
                    lexical_score: c.lexical_score,
                    semantic_score: c.semantic_score,
                    rerank_score,
                    chunk: c.chunk,
                }
            })
            .collect();

        if scores.is_some() {
            // Stable: equal rerank scores keep fusion order
            results.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::embeddings::HashEmbedder;
    use crate::models::{Chunk, ChunkMetadata, IndexStats};
    use crate::search::vector::{VectorEntry, VectorStore};
    use chrono::Utc;

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("embedding service down")
        }
    }

    /// Scores documents by their position: the last one scores highest.
    struct ReversingReranker;

    impl Reranker for ReversingReranker {
        fn score(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok((0..documents.len()).map(|i| i as f32).collect())
        }
    }

    struct ConstantReranker;

    impl Reranker for ConstantReranker {
        fn score(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.5; documents.len()])
        }
    }

    struct BrokenReranker;

    impl Reranker for BrokenReranker {
        fn score(&self, _query: &str, _documents: &[String]) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("reranker timed out")
        }
    }

    fn chunk(path: &str, content: &str, type_name: &str) -> Chunk {
        Chunk {
            id: Chunk::stable_id(path, 0),
            repository: "repo".to_string(),
            file_path: format!("/repo/{path}"),
            relative_path: path.to_string(),
            language: "csharp".to_string(),
            chunk_index: 0,
            byte_offset: 0,
            start_line: 1,
            end_line: 5,
            content: content.to_string(),
            metadata: ChunkMetadata {
                type_name: Some(type_name.to_string()),
                ..Default::default()
            },
            modified_at: None,
        }
    }

    fn stats(total: usize) -> IndexStats {
        IndexStats {
            total_chunks: total,
            files_indexed: total,
            files_excluded: 0,
            chunks_skipped: 0,
            final_batch_size: 100,
            repositories: Vec::new(),
            refreshed_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    fn populated_store(chunks: Vec<Chunk>) -> Arc<VectorStore> {
        let embedder = HashEmbedder::new(64);
        let store = VectorStore::in_memory();
        let total = chunks.len();
        let texts: Vec<String> = chunks.iter().map(|c| c.retrieval_text()).collect();
        let embeddings = embedder.embed_batch(&texts).unwrap();
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
            .collect();
        store.begin_rebuild();
        store.insert_batch(entries).unwrap();
        store.commit(stats(total)).unwrap();
        Arc::new(store)
    }

    fn sample_store() -> Arc<VectorStore> {
        populated_store(vec![
            chunk("Link.cs", "public void Navigate() { target.Open(); }", "FormLink"),
            chunk("Csv.cs", "public string[] ReadRow() { return row; }", "CsvReader"),
            chunk("Db.cs", "public void Connect() { pool.Open(url); }", "Database"),
            chunk("Log.cs", "public void Write(string line) {}", "Logger"),
        ])
    }

    fn engine(
        config: SearchConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> HybridSearchEngine {
        HybridSearchEngine::new(config, store, embedder, reranker, Arc::new(LexicalCache::new()))
    }

    fn hashing() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(64))
    }

    #[test]
    fn test_not_ready_before_first_commit() {
        let store = Arc::new(VectorStore::in_memory());
        let engine = engine(SearchConfig::default(), store, hashing(), None);
        assert!(matches!(engine.search("anything", 5), Err(Error::IndexNotReady)));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let engine = engine(SearchConfig::default(), populated_store(Vec::new()), hashing(), None);
        assert!(engine.search("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn test_empty_query_and_zero_top_k() {
        let engine = engine(SearchConfig::default(), sample_store(), hashing(), None);
        assert!(engine.search("   ", 5).unwrap().is_empty());
        assert!(engine.search("FormLink", 0).unwrap().is_empty());
    }

    #[test]
    fn test_fused_results_bounded_by_top_k() {
        let engine = engine(SearchConfig::default(), sample_store(), hashing(), None);
        let results = engine.search("FormLink navigation", 2).unwrap();
        assert!(!results.is_empty() && results.len() <= 2);
        assert_eq!(results[0].chunk.relative_path, "Link.cs");
        assert_eq!(results[0].stage, RetrievalStage::Fused);
        assert!(results[0].matched_both);
    }

    #[test]
    fn test_lexical_disabled_serves_semantic_only() {
        let config = SearchConfig {
            lexical_enabled: false,
            ..SearchConfig::default()
        };
        let engine = engine(config, sample_store(), hashing(), None);
        let results = engine.search("FormLink", 3).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.stage == RetrievalStage::Semantic));
        assert!(results.iter().all(|r| r.lexical_score.is_none()));
    }

    #[test]
    fn test_embedding_failure_serves_lexical_only() {
        let engine = engine(
            SearchConfig::default(),
            sample_store(),
            Arc::new(BrokenEmbedder),
            None,
        );
        let results = engine.search("CsvReader", 3).unwrap();
        assert_eq!(results[0].chunk.relative_path, "Csv.cs");
        assert!(results.iter().all(|r| r.stage == RetrievalStage::Lexical));
    }

    #[test]
    fn test_both_signals_down_is_an_error() {
        let config = SearchConfig {
            lexical_enabled: false,
            ..SearchConfig::default()
        };
        let engine = engine(config, sample_store(), Arc::new(BrokenEmbedder), None);
        assert!(matches!(
            engine.search("FormLink", 3),
            Err(Error::RetrievalUnavailable { .. })
        ));
    }

    #[test]
    fn test_reranker_decides_final_order() {
        let plain = engine(SearchConfig::default(), sample_store(), hashing(), None);
        let fused: Vec<String> = plain
            .search("public void", 4)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.relative_path)
            .collect();

        let reranked = engine(
            SearchConfig::default(),
            sample_store(),
            hashing(),
            Some(Arc::new(ReversingReranker)),
        );
        let results = reranked.search("public void", 4).unwrap();
        assert!(results.iter().all(|r| r.stage == RetrievalStage::Reranked));
        assert!(results.iter().all(|r| r.rerank_score.is_some()));

        // All four chunks are candidates, so the fused order comes back reversed
        let mut expected = fused.clone();
        expected.reverse();
        let got: Vec<String> = results.into_iter().map(|r| r.chunk.relative_path).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_equal_rerank_scores_keep_fused_order() {
        let plain = engine(SearchConfig::default(), sample_store(), hashing(), None);
        let reranked = engine(
            SearchConfig::default(),
            sample_store(),
            hashing(),
            Some(Arc::new(ConstantReranker)),
        );
        let a: Vec<String> = plain
            .search("Open", 4)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.relative_path)
            .collect();
        let b: Vec<String> = reranked
            .search("Open", 4)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.relative_path)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reranker_failure_keeps_fused_order() {
        let plain = engine(SearchConfig::default(), sample_store(), hashing(), None);
        let broken = engine(
            SearchConfig::default(),
            sample_store(),
            hashing(),
            Some(Arc::new(BrokenReranker)),
        );
        let a = plain.search("Open", 4).unwrap();
        let b = broken.search("Open", 4).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.chunk.id, y.chunk.id);
            assert_eq!(y.stage, RetrievalStage::Fused);
            assert!(y.rerank_score.is_none());
        }
    }

    #[test]
    fn test_oversized_top_k_is_capped_by_index_size() {
        let engine = engine(SearchConfig::default(), sample_store(), hashing(), None);
        for top_k in [usize::MAX, 1 << 40] {
            let results = engine.search("FormLink", top_k).unwrap();
            assert!(!results.is_empty() && results.len() <= 4);
            assert_eq!(results[0].chunk.relative_path, "Link.cs");
        }
    }

    #[test]
    fn test_dimension_mismatch_disables_semantic_signal() {
        // Indexed at 64 dimensions, queried at 128
        let wider: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));

        let semantic_only = SearchConfig {
            lexical_enabled: false,
            ..SearchConfig::default()
        };
        let engine_a = engine(semantic_only, sample_store(), wider.clone(), None);
        assert!(matches!(
            engine_a.search("CsvReader", 3),
            Err(Error::RetrievalUnavailable { .. })
        ));

        let engine_b = engine(SearchConfig::default(), sample_store(), wider, None);
        let results = engine_b.search("CsvReader", 3).unwrap();
        assert_eq!(results[0].chunk.relative_path, "Csv.cs");
        assert!(results.iter().all(|r| r.stage == RetrievalStage::Lexical));
        assert!(results.iter().all(|r| r.semantic_score.is_none()));
    }
}
