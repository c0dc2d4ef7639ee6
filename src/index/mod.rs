//! Index construction: walk each repository, filter, extract metadata, chunk
//! and insert the chunks into a staged rebuild of the chunk store in batches.

pub mod walk;

use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::chunking;
use crate::config::{ChunkingConfig, Config, IndexingConfig};
use crate::error::{Error, Result};
use crate::filter::FileFilterer;
use crate::llm::embeddings::Embedder;
use crate::metadata::{FileMetadata, MetadataExtractor};
use crate::models::{Chunk, IndexStats, RepositoryStats, SourceUnit};
use crate::search::bm25::LexicalCache;
use crate::search::vector::{ChunkStore, VectorEntry};

/// Split a user-supplied list of roots. Newlines separate entries when
/// present, commas otherwise.
pub fn parse_repository_paths(raw: &str) -> Vec<PathBuf> {
    let separator = if raw.contains('\n') { '\n' } else { ',' };
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// The root that already covers `roots[index]`: an enclosing root anywhere
/// in the list, or an identical one listed earlier.
fn covering_root<'a>(
    root: &Path,
    index: usize,
    roots: &'a [(&PathBuf, Option<PathBuf>)],
) -> Option<&'a PathBuf> {
    roots.iter().enumerate().find_map(|(j, (_, other))| {
        let other = other.as_ref()?;
        let covers = if other == root {
            j < index
        } else {
            root.starts_with(other)
        };
        covers.then_some(other)
    })
}

/// Result of pushing all chunks of a refresh through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchOutcome {
    inserted: usize,
    skipped: usize,
    final_batch_size: usize,
}

pub struct IndexManager {
    filterer: FileFilterer,
    extractor: Option<MetadataExtractor>,
    chunking: ChunkingConfig,
    indexing: IndexingConfig,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    lexical: Arc<LexicalCache>,
    refresh_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(
        config: &Config,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        lexical: Arc<LexicalCache>,
    ) -> Self {
        let extractor = match MetadataExtractor::new(config.indexing.metadata_max_length) {
            Ok(extractor) => Some(extractor),
            Err(e) => {
                tracing::warn!("Metadata extraction disabled: {e}");
                None
            }
        };

        Self {
            filterer: FileFilterer::new(config.filter.clone()),
            extractor,
            chunking: config.chunking,
            indexing: config.indexing.clone(),
            store,
            embedder,
            lexical,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Stats of the last committed refresh.
    pub fn get_stats(&self) -> Result<IndexStats> {
        self.store.stats().ok_or(Error::IndexNotReady)
    }

    /// Rebuild the whole index from `repository_paths`.
    ///
    /// Roots that do not resolve are reported in the stats as unavailable;
    /// the refresh fails only when none resolve. Searches keep seeing the
    /// previous index until the rebuild commits.
    pub fn refresh(&self, repository_paths: &[PathBuf]) -> Result<IndexStats> {
        let _guard = self.refresh_lock.lock();
        let started = Instant::now();

        let resolved: Vec<(&PathBuf, Option<PathBuf>)> = repository_paths
            .iter()
            .map(|path| (path, walk::resolve_root(path)))
            .collect();
        let mut targets: Vec<(&PathBuf, Option<PathBuf>)> = Vec::new();
        for (i, (path, root)) in resolved.iter().enumerate() {
            if let Some(root) = root {
                if let Some(outer) = covering_root(root, i, &resolved) {
                    tracing::warn!(
                        "Ignoring repository root {}: already covered by {}",
                        path.display(),
                        outer.display()
                    );
                    continue;
                }
            }
            targets.push((*path, root.clone()));
        }

        if !targets.iter().any(|(_, root)| root.is_some()) {
            let listed: Vec<String> = repository_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            return Err(Error::Configuration(format!(
                "no readable repository directory among [{}]",
                listed.join(", ")
            )));
        }

        tracing::info!("Refreshing index over {} repository root(s)", targets.len());
        self.store.begin_rebuild();

        let mut repositories = Vec::with_capacity(targets.len());
        let mut chunks = Vec::new();
        for (path, root) in targets {
            match root {
                Some(root) => {
                    let (stats, repo_chunks) = self.index_repository(&root);
                    repositories.push(stats);
                    chunks.extend(repo_chunks);
                }
                None => {
                    tracing::warn!("Repository root {} is not a readable directory", path.display());
                    repositories.push(RepositoryStats {
                        root: path.display().to_string(),
                        repository: walk::repository_tag(path),
                        available: false,
                        ..Default::default()
                    });
                }
            }
        }

        let outcome = self.insert_chunks(&chunks);

        let stats = IndexStats {
            total_chunks: outcome.inserted,
            files_indexed: repositories.iter().map(|r| r.files_indexed).sum(),
            files_excluded: repositories.iter().map(|r| r.files_excluded).sum(),
            chunks_skipped: outcome.skipped,
            final_batch_size: outcome.final_batch_size,
            repositories,
            refreshed_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        self.store
            .commit(stats.clone())
            .map_err(|e| Error::Persist(format!("{e:#}")))?;
        self.lexical.invalidate();

        tracing::info!(
            "Index refreshed: {} chunks from {} files ({} excluded, {} chunks skipped) in {}ms",
            stats.total_chunks,
            stats.files_indexed,
            stats.files_excluded,
            stats.chunks_skipped,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    fn index_repository(&self, root: &Path) -> (RepositoryStats, Vec<Chunk>) {
        let repository = walk::repository_tag(root);
        let scan = walk::scan_repository(root, &self.filterer);

        let mut stats = RepositoryStats {
            root: root.display().to_string(),
            repository: repository.clone(),
            available: true,
            files_scanned: scan.scanned,
            files_excluded: scan.excluded,
            ..Default::default()
        };

        let mut chunks = Vec::new();
        for path in &scan.files {
            match walk::read_source(root, &repository, path, self.indexing.max_file_bytes) {
                Ok(Some(unit)) => {
                    if self.filterer.is_generated_content(&unit.text) {
                        tracing::debug!("Skipping generated file {}", unit.relative_path);
                        stats.files_excluded += 1;
                        continue;
                    }
                    let file_chunks = self.chunk_unit(&unit);
                    tracing::debug!("{}: {} chunks", unit.relative_path, file_chunks.len());
                    stats.files_indexed += 1;
                    stats.chunks_created += file_chunks.len();
                    chunks.extend(file_chunks);
                }
                Ok(None) => stats.files_excluded += 1,
                Err(e) => {
                    tracing::warn!("{e}");
                    stats.files_failed += 1;
                }
            }
        }

        tracing::info!(
            "{repository}: {} files indexed, {} excluded, {} failed, {} chunks",
            stats.files_indexed,
            stats.files_excluded,
            stats.files_failed,
            stats.chunks_created
        );
        (stats, chunks)
    }

    fn chunk_unit(&self, unit: &SourceUnit) -> Vec<Chunk> {
        let file_metadata = self
            .extractor
            .as_ref()
            .map(|x| x.extract(&unit.text, unit.language))
            .unwrap_or_else(FileMetadata::default);
        if file_metadata.is_empty() {
            tracing::debug!("{}: no declarations found", unit.relative_path);
        }
        let file_path = unit.path.to_string_lossy().to_string();

        chunking::chunk_code(&unit.text, unit.language, &self.chunking)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, out)| Chunk {
                id: Chunk::stable_id(&file_path, out.byte_offset),
                repository: unit.repository.clone(),
                file_path: file_path.clone(),
                relative_path: unit.relative_path.clone(),
                language: unit.language.as_str().to_string(),
                chunk_index,
                byte_offset: out.byte_offset,
                start_line: out.start_line,
                end_line: out.end_line,
                metadata: file_metadata.for_lines(out.start_line, out.end_line),
                content: out.content,
                modified_at: unit.modified_at,
            })
            .collect()
    }

    /// Insert `chunks` in batches. A failing batch halves the batch size and
    /// the same range is retried; a failing single chunk is skipped. The
    /// reduced size sticks for the rest of the refresh.
    fn insert_chunks(&self, chunks: &[Chunk]) -> BatchOutcome {
        let mut size = self.indexing.batch_size.max(1);
        let mut outcome = BatchOutcome {
            inserted: 0,
            skipped: 0,
            final_batch_size: size,
        };

        let mut start = 0;
        while start < chunks.len() {
            let end = (start + size).min(chunks.len());
            let batch = &chunks[start..end];
            match self.insert_batch(batch) {
                Ok(()) => {
                    outcome.inserted += batch.len();
                    start = end;
                }
                Err(e) if batch.len() > 1 => {
                    size = (batch.len() / 2).max(1);
                    tracing::warn!("{e}; retrying with batches of {size}");
                }
                Err(e) => {
                    let chunk = &batch[0];
                    tracing::error!(
                        "Skipping chunk {}:{}-{}: {e}",
                        chunk.relative_path,
                        chunk.start_line,
                        chunk.end_line
                    );
                    outcome.skipped += 1;
                    start = end;
                }
            }
        }

        outcome.final_batch_size = size;
        outcome
    }

    fn insert_batch(&self, batch: &[Chunk]) -> Result<()> {
        let failed = |message: String| Error::BatchInsertion {
            size: batch.len(),
            message,
        };

        let texts: Vec<String> = batch.iter().map(Chunk::retrieval_text).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| failed(format!("{e:#}")))?;
        if embeddings.len() != batch.len() {
            return Err(failed(format!(
                "got {} embeddings for {} chunks",
                embeddings.len(),
                batch.len()
            )));
        }

        let entries = batch
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
            .collect();
        self.store
            .insert_batch(entries)
            .map_err(|e| failed(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::embeddings::HashEmbedder;
    use crate::models::Chunk;
    use crate::search::vector::{VectorHit, VectorStore};

    /// Rejects any batch holding a chunk whose content contains `poison`.
    struct PoisonedStore {
        inner: VectorStore,
        poison: &'static str,
    }

    impl ChunkStore for PoisonedStore {
        fn begin_rebuild(&self) {
            self.inner.begin_rebuild()
        }

        fn insert_batch(&self, entries: Vec<VectorEntry>) -> anyhow::Result<()> {
            if entries.iter().any(|e| e.chunk.content.contains(self.poison)) {
                anyhow::bail!("storage rejected batch");
            }
            self.inner.insert_batch(entries)
        }

        fn commit(&self, stats: IndexStats) -> anyhow::Result<()> {
            self.inner.commit(stats)
        }

        fn search(&self, query: &[f32], limit: usize) -> Vec<VectorHit> {
            self.inner.search(query, limit)
        }

        fn chunks(&self) -> Vec<Chunk> {
            self.inner.chunks()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn dim(&self) -> Option<usize> {
            self.inner.dim()
        }

        fn stats(&self) -> Option<IndexStats> {
            self.inner.stats()
        }

        fn version(&self) -> u64 {
            self.inner.version()
        }
    }

    fn manager(config: &Config, store: Arc<dyn ChunkStore>) -> IndexManager {
        IndexManager::new(
            config,
            store,
            Arc::new(HashEmbedder::new(32)),
            Arc::new(LexicalCache::new()),
        )
    }

    #[test]
    fn test_parse_repository_paths() {
        assert_eq!(
            parse_repository_paths(" /a , /b,,"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        // Newlines win over commas, so paths may contain commas
        assert_eq!(
            parse_repository_paths("/src/a,b\n\n /src/c \n"),
            vec![PathBuf::from("/src/a,b"), PathBuf::from("/src/c")]
        );
        assert!(parse_repository_paths("  ").is_empty());
    }

    #[test]
    fn test_stats_before_refresh() {
        let m = manager(&Config::default(), Arc::new(VectorStore::in_memory()));
        assert!(matches!(m.get_stats(), Err(Error::IndexNotReady)));
    }

    #[test]
    fn test_no_resolvable_root_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&Config::default(), Arc::new(VectorStore::in_memory()));
        let err = m.refresh(&[dir.path().join("nope")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(matches!(m.refresh(&[]), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unavailable_root_reported_alongside_good_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.cs"), "class A {}\n").unwrap();
        let m = manager(&Config::default(), Arc::new(VectorStore::in_memory()));

        let stats = m
            .refresh(&[dir.path().to_path_buf(), dir.path().join("missing")])
            .unwrap();
        assert_eq!(stats.repositories.len(), 2);
        assert!(stats.repositories[0].available);
        assert!(!stats.repositories[1].available);
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(m.get_stats().unwrap(), stats);
    }

    #[test]
    fn test_poisoned_chunk_is_skipped_and_size_sticks() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            let body = if i == 5 { "POISON" } else { "ok" };
            std::fs::write(
                dir.path().join(format!("F{i}.cs")),
                format!("class F{i} {{ /* {body} */ }}\n"),
            )
            .unwrap();
        }

        let mut config = Config::default();
        config.indexing.batch_size = 8;
        let store = Arc::new(PoisonedStore {
            inner: VectorStore::in_memory(),
            poison: "POISON",
        });
        let m = manager(&config, store.clone());

        let stats = m.refresh(&[dir.path().to_path_buf()]).unwrap();
        // 8 fails; F0-F3 pass at 4; F4-F7 fails; F4-F5 fails at 2; F5 alone is skipped
        assert_eq!(stats.total_chunks, 7);
        assert_eq!(stats.chunks_skipped, 1);
        assert_eq!(stats.final_batch_size, 1);
        assert_eq!(store.len(), 7);
        assert!(store.chunks().iter().all(|c| !c.content.contains("POISON")));
    }

    #[test]
    fn test_chunks_carry_metadata_and_stable_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Link.cs"),
            "namespace App.Forms\n{\n    public class FormLink\n    {\n        public void Navigate() {}\n    }\n}\n",
        )
        .unwrap();
        let store = Arc::new(VectorStore::in_memory());
        let m = manager(&Config::default(), store.clone());

        m.refresh(&[dir.path().to_path_buf()]).unwrap();
        let first = store.chunks();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].metadata.namespace.as_deref(), Some("App.Forms"));
        assert_eq!(first[0].relative_path, "Link.cs");
        assert_eq!(first[0].language, "csharp");

        m.refresh(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(store.chunks()[0].id, first[0].id);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_nested_and_repeated_roots_index_files_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("A.cs"), "class A {}\n").unwrap();
        std::fs::write(dir.path().join("sub/B.cs"), "class B {}\n").unwrap();

        let single = manager(&Config::default(), Arc::new(VectorStore::in_memory()))
            .refresh(&[dir.path().to_path_buf()])
            .unwrap();

        let store = Arc::new(VectorStore::in_memory());
        let m = manager(&Config::default(), store.clone());
        // The child comes first, so the parent has to win regardless of order
        let stats = m
            .refresh(&[
                dir.path().join("sub"),
                dir.path().to_path_buf(),
                dir.path().join("sub/../sub"),
                dir.path().to_path_buf(),
            ])
            .unwrap();

        assert_eq!(stats.total_chunks, single.total_chunks);
        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.repositories.len(), 1);

        let mut ids: Vec<_> = store.chunks().into_iter().map(|c| c.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
