//! Error taxonomy for indexing and retrieval.
//!
//! Per-file and per-batch failures are contained inside the
//! [`IndexManager`](crate::index::IndexManager) and only logged; the variants
//! that reach callers are the ones that prevent serving any result at all.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the indexing and search core.
#[derive(Debug, Error)]
pub enum Error {
    /// No repository root resolved to an existing, readable directory.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structural parsing of a single file failed.
    #[error("failed to parse {language} source: {message}")]
    Parse {
        language: &'static str,
        message: String,
    },

    /// Embedding or persisting one batch of chunks failed.
    #[error("batch insertion of {size} chunk(s) failed: {message}")]
    BatchInsertion { size: usize, message: String },

    /// A retrieval stage could not produce candidates.
    #[error("{stage} retrieval unavailable: {message}")]
    RetrievalUnavailable { stage: &'static str, message: String },

    /// Query or stats request before any successful refresh.
    #[error("index does not exist yet; run refresh_index first")]
    IndexNotReady,

    /// The committed index could not be written to durable storage.
    #[error("failed to persist index: {0}")]
    Persist(String),
}

/// Convenience type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn retrieval(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::RetrievalUnavailable {
            stage,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_mentions_refresh() {
        let msg = Error::IndexNotReady.to_string();
        assert!(msg.contains("refresh_index"));
    }

    #[test]
    fn test_file_read_includes_path() {
        let err = Error::FileRead {
            path: PathBuf::from("/repo/A.cs"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not utf-8"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/repo/A.cs"));
        assert!(msg.contains("not utf-8"));
    }
}
