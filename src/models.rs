use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::chunking::Language;

/// A source file read from disk, alive only while it is being indexed.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,
    /// Origin tag: the repository root's directory name
    pub repository: String,
    pub language: Language,
    pub text: String,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Structural metadata attached to every chunk carved from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    pub member_name: Option<String>,
    /// File-level "kind:Name" list, truncated
    pub defined_types: Option<String>,
    /// File-level member list, truncated
    pub methods: Option<String>,
}

impl ChunkMetadata {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none()
            && self.type_name.is_none()
            && self.member_name.is_none()
            && self.defined_types.is_none()
            && self.methods.is_none()
    }
}

/// A single indexed chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub repository: String,
    pub file_path: String,
    pub relative_path: String,
    pub language: String,
    pub chunk_index: usize,
    pub byte_offset: usize,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "ChunkMetadata::is_empty")]
    pub metadata: ChunkMetadata,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Chunk {
    /// Identifier derived from the file path and the chunk's byte offset, so
    /// an unchanged file always yields the same ids.
    pub fn stable_id(file_path: &str, byte_offset: usize) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{file_path}#{byte_offset}").as_bytes(),
        )
    }

    /// Text handed to the embedder and the reranker: a short header naming
    /// where the chunk lives, then the chunk itself.
    pub fn retrieval_text(&self) -> String {
        let mut header = format!("File: {}", self.relative_path);
        if let Some(ns) = &self.metadata.namespace {
            header.push_str(&format!("\nNamespace: {ns}"));
        }
        if let Some(ty) = &self.metadata.type_name {
            header.push_str(&format!("\nType: {ty}"));
        }
        if let Some(member) = &self.metadata.member_name {
            header.push_str(&format!("\nMember: {member}"));
        }
        format!("{header}\n\n{}", self.content)
    }
}

/// Which retrieval stage produced a result's final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStage {
    Lexical,
    Semantic,
    Fused,
    Reranked,
}

/// A ranked chunk returned by a search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
    pub stage: RetrievalStage,
    /// Found by both lexical and semantic retrieval. Informational only.
    pub matched_both: bool,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
    pub rerank_score: Option<f32>,
}

/// Per-repository counts from one refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub root: String,
    pub repository: String,
    /// False when the root did not resolve to a readable directory
    pub available: bool,
    pub files_scanned: usize,
    pub files_excluded: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub chunks_created: usize,
}

/// Statistics of the last committed refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub files_indexed: usize,
    pub files_excluded: usize,
    pub chunks_skipped: usize,
    pub final_batch_size: usize,
    pub repositories: Vec<RepositoryStats>,
    pub refreshed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Repository roots as sent by callers: one string (comma- or
/// newline-separated) or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RepositoryPaths {
    Joined(String),
    List(Vec<String>),
}

/// Refresh request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    pub repository_paths: Option<RepositoryPaths>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}
