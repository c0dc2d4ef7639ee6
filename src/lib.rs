//! # repo-rag
//!
//! Hybrid code retrieval over local source repositories. A refresh walks
//! the configured roots and rebuilds a persisted chunk index; a query runs
//! semantic and lexical retrieval side by side, fuses the two rankings and
//! lets a cross-encoder have the final word.
//!
//! ## Architecture
//!
//! ```text
//!   refresh_index                         search_repository
//!   ─────────────                         ─────────────────
//!   repository roots                          query
//!         │                                     │
//!         ▼                        ┌────────────┴────────────┐
//!   ┌─────────────┐                ▼                         ▼
//!   │ FileFilterer│       ┌─────────────────┐      ┌──────────────────┐
//!   │ path+header │       │ Semantic        │      │ Lexical (BM25)   │
//!   └──────┬──────┘       │ cosine, top_k×2 │      │ cached, top_k×2  │
//!          ▼              └────────┬────────┘      └────────┬─────────┘
//!   ┌─────────────┐                └────────────┬───────────┘
//!   │ Metadata    │                             ▼
//!   │ extraction  │                  ┌─────────────────────┐
//!   └──────┬──────┘                  │ RRF fusion (k = 60) │
//!          ▼                         │ keep top_k × 3      │
//!   ┌─────────────┐                  └──────────┬──────────┘
//!   │ Chunker     │                             ▼
//!   │ 40/15/2048  │                  ┌─────────────────────┐
//!   └──────┬──────┘                  │ Cross-encoder       │
//!          ▼                         │ rerank (stable)     │
//!   ┌─────────────┐                  └──────────┬──────────┘
//!   │ Batched     │                             ▼
//!   │ embed+insert│                        first top_k
//!   └──────┬──────┘
//!          ▼
//!    commit, drop lexical cache
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration with defaults
//! - [`error`] - Error taxonomy shared by indexing and search
//! - [`models`] - Chunks, search results, stats and request/response types
//! - [`filter`] - Extension, directory, generated-suffix and header filtering
//! - [`metadata`] - Regex extraction of namespaces, types and members
//! - [`chunking`] - Overlapping line windows ending on tree-sitter boundaries
//! - [`text`] - Identifier-aware tokenisation
//! - [`index`] - Repository walking and the batched index rebuild
//! - [`search::vector`] - Persistent chunk store with cosine similarity search
//! - [`search::bm25`] - In-memory BM25 index powered by tantivy, cached per store version
//! - [`search::hybrid`] - Reciprocal Rank Fusion keyed by chunk identity
//! - [`search::engine`] - The query pipeline and its degradation rules
//! - [`llm::embeddings`] - Hashing, Ollama and OpenAI-compatible embedders
//! - [`llm::cross_encoder`] - `/v1/rerank` cross-encoder client
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod llm;
pub mod metadata;
pub mod models;
pub mod search;
pub mod state;
pub mod text;
