use std::sync::Arc;

use crate::config::Config;
use crate::index::IndexManager;
use crate::llm::cross_encoder::build_reranker;
use crate::llm::embeddings::build_embedder;
use crate::search::bm25::LexicalCache;
use crate::search::engine::HybridSearchEngine;
use crate::search::vector::{ChunkStore, VectorStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<IndexManager>,
    pub engine: Arc<HybridSearchEngine>,
}

impl AppState {
    /// Open the persisted index and wire up the providers. Builds blocking
    /// HTTP clients, so call it off the async runtime.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ChunkStore> = Arc::new(VectorStore::open_or_create(&config.vector_dir())?);
        let embedder = build_embedder(&config.llm)?;
        let reranker = build_reranker(&config.reranker)?;
        let lexical = Arc::new(LexicalCache::new());

        if reranker.is_none() {
            tracing::info!("No reranker configured; results keep their fused order");
        }

        let index = IndexManager::new(&config, store.clone(), embedder.clone(), lexical.clone());
        let engine = HybridSearchEngine::new(config.search.clone(), store, embedder, reranker, lexical);

        Ok(Self {
            config: Arc::new(config),
            index: Arc::new(index),
            engine: Arc::new(engine),
        })
    }
}
