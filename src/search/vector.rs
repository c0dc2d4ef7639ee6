use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{Chunk, IndexStats};

/// A chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Durable chunk storage with nearest-neighbour search.
///
/// A rebuild is staged with [`begin_rebuild`](ChunkStore::begin_rebuild) and
/// [`insert_batch`](ChunkStore::insert_batch); readers keep seeing the
/// previous committed index until [`commit`](ChunkStore::commit) swaps it in.
pub trait ChunkStore: Send + Sync {
    /// Drop any staged entries and start a fresh rebuild.
    fn begin_rebuild(&self);

    fn insert_batch(&self, entries: Vec<VectorEntry>) -> Result<()>;

    /// Persist the staged entries with `stats` and make them live.
    fn commit(&self, stats: IndexStats) -> Result<()>;

    fn search(&self, query: &[f32], limit: usize) -> Vec<VectorHit>;

    /// All live chunks, in insertion order.
    fn chunks(&self) -> Vec<Chunk>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding length of the live entries; `None` while the index is empty.
    fn dim(&self) -> Option<usize>;

    /// Stats of the last commit; `None` until an index exists.
    fn stats(&self) -> Option<IndexStats>;

    /// Bumped on every commit. Derived caches key on it.
    fn version(&self) -> u64;
}

/// On-disk layout of the vector store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    stats: Option<IndexStats>,
    entries: Vec<VectorEntry>,
}

/// In-memory vector store with JSON persistence and cosine similarity search.
pub struct VectorStore {
    live: RwLock<Snapshot>,
    staged: Mutex<Vec<VectorEntry>>,
    version: AtomicU64,
    persist_path: Option<PathBuf>,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)
            .with_context(|| format!("Failed to create {}", vector_dir.display()))?;
        let persist_path = vector_dir.join("index.json");

        let snapshot = if persist_path.exists() {
            let file = std::fs::File::open(&persist_path).context("Failed to open vector store")?;
            match serde_json::from_reader::<_, Snapshot>(BufReader::new(file)) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable vector store at {}: {e}",
                        persist_path.display()
                    );
                    Snapshot::default()
                }
            }
        } else {
            Snapshot::default()
        };

        if snapshot.stats.is_some() {
            tracing::info!(
                "Loaded {} indexed chunks from {}",
                snapshot.entries.len(),
                persist_path.display()
            );
        }

        let version = u64::from(snapshot.stats.is_some());
        Ok(Self {
            live: RwLock::new(snapshot),
            staged: Mutex::new(Vec::new()),
            version: AtomicU64::new(version),
            persist_path: Some(persist_path),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            live: RwLock::new(Snapshot::default()),
            staged: Mutex::new(Vec::new()),
            version: AtomicU64::new(0),
            persist_path: None,
        }
    }

    /// Write via temp file + rename so a crash never leaves a torn index.
    fn persist(path: &Path, snapshot: &Snapshot) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        let file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot).context("Failed to serialize vector store")?;
        writer.flush().context("Failed to flush vector store")?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl ChunkStore for VectorStore {
    fn begin_rebuild(&self) {
        self.staged.lock().clear();
    }

    fn insert_batch(&self, entries: Vec<VectorEntry>) -> Result<()> {
        self.staged.lock().extend(entries);
        Ok(())
    }

    fn commit(&self, stats: IndexStats) -> Result<()> {
        let entries = std::mem::take(&mut *self.staged.lock());
        let snapshot = Snapshot {
            stats: Some(stats),
            entries,
        };

        if let Some(path) = &self.persist_path {
            Self::persist(path, &snapshot)?;
        }

        *self.live.write() = snapshot;
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    fn search(&self, query: &[f32], limit: usize) -> Vec<VectorHit> {
        let live = self.live.read();

        let mut scored: Vec<(f32, &VectorEntry)> = live
            .entries
            .iter()
            .map(|e| (cosine_similarity(query, &e.embedding), e))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                chunk: e.chunk.clone(),
                score,
            })
            .collect()
    }

    fn chunks(&self) -> Vec<Chunk> {
        self.live.read().entries.iter().map(|e| e.chunk.clone()).collect()
    }

    fn len(&self) -> usize {
        self.live.read().entries.len()
    }

    fn dim(&self) -> Option<usize> {
        self.live.read().entries.first().map(|e| e.embedding.len())
    }

    fn stats(&self) -> Option<IndexStats> {
        self.live.read().stats.clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
