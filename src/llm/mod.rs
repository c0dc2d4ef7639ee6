//! Model-backed capabilities: embeddings and cross-encoder reranking.

pub mod cross_encoder;
pub mod embeddings;
