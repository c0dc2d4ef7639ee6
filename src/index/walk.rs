//! Repository traversal: root resolution, pruned directory walks and
//! source file reads.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunking::Language;
use crate::error::{Error, Result};
use crate::filter::FileFilterer;
use crate::models::SourceUnit;

/// Files a walk accepted, plus counts for the ones it turned away.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<PathBuf>,
    pub scanned: usize,
    pub excluded: usize,
}

/// Canonicalise `path` if it names an existing, readable directory.
pub fn resolve_root(path: &Path) -> Option<PathBuf> {
    let root = std::fs::canonicalize(path).ok()?;
    if !root.is_dir() || std::fs::read_dir(&root).is_err() {
        return None;
    }
    Some(root)
}

/// Origin tag for chunks under `root`: its directory name.
pub fn repository_tag(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// Walk `root` in file-name order, never descending into excluded
/// directories, and keep the files the filterer accepts.
pub fn scan_repository(root: &Path, filterer: &FileFilterer) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !filterer.is_excluded_dir(&e.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        outcome.scanned += 1;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if filterer.accepts(relative) {
            outcome.files.push(entry.into_path());
        } else {
            outcome.excluded += 1;
        }
    }

    outcome
}

/// Read one source file. Files above `max_bytes` give `Ok(None)`.
pub fn read_source(
    root: &Path,
    repository: &str,
    path: &Path,
    max_bytes: u64,
) -> Result<Option<SourceUnit>> {
    let meta = std::fs::metadata(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > max_bytes {
        tracing::debug!("Skipping {} ({} bytes)", path.display(), meta.len());
        return Ok(None);
    }

    let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let relative_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");

    Ok(Some(SourceUnit {
        path: path.to_path_buf(),
        relative_path,
        repository: repository.to_string(),
        language: Language::from_path(path),
        text,
        modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
    }))
}
