use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

use crate::models::Chunk;
use crate::text::identifier_tokens;

/// In-memory BM25 index over the live chunk set, built on tantivy.
///
/// Documents only carry their position in `chunks`; results are resolved
/// against that vector instead of stored fields.
pub struct Bm25Index {
    index: Index,
    reader: IndexReader,
    chunks: Vec<Chunk>,
    // Field handles
    f_ord: Field,
    f_content: Field,
    f_file_path: Field,
    f_symbols: Field,
    f_namespace: Field,
    f_type_name: Field,
    f_member_name: Field,
    f_defined_types: Field,
    f_methods: Field,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub chunk: Chunk,
    pub score: f32,
}

impl Bm25Index {
    /// Index `chunks` in RAM.
    pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let f_ord = schema_builder.add_u64_field("ord", NumericOptions::default() | STORED);
        let f_content = schema_builder.add_text_field("content", TEXT);
        let f_file_path = schema_builder.add_text_field("file_path", TEXT);
        let f_symbols = schema_builder.add_text_field("symbols", TEXT);
        let f_namespace = schema_builder.add_text_field("namespace", TEXT);
        let f_type_name = schema_builder.add_text_field("type_name", TEXT);
        let f_member_name = schema_builder.add_text_field("member_name", TEXT);
        let f_defined_types = schema_builder.add_text_field("defined_types", TEXT);
        let f_methods = schema_builder.add_text_field("methods", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let mut writer: IndexWriter = index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        for (ord, chunk) in chunks.iter().enumerate() {
            let meta = &chunk.metadata;
            let mut document = TantivyDocument::default();
            document.add_u64(f_ord, ord as u64);
            document.add_text(f_content, &chunk.content);
            document.add_text(f_file_path, &chunk.relative_path);
            document.add_text(f_symbols, symbol_terms(chunk));
            let optional = [
                (f_namespace, &meta.namespace),
                (f_type_name, &meta.type_name),
                (f_member_name, &meta.member_name),
                (f_defined_types, &meta.defined_types),
                (f_methods, &meta.methods),
            ];
            for (field, value) in optional {
                if let Some(text) = value {
                    document.add_text(field, text);
                }
            }
            writer.add_document(document)?;
        }

        writer.commit().context("Failed to commit index")?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;

        Ok(Self {
            index,
            reader,
            chunks,
            f_ord,
            f_content,
            f_file_path,
            f_symbols,
            f_namespace,
            f_type_name,
            f_member_name,
            f_defined_types,
            f_methods,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Search the index and return scored hits.
    ///
    /// The query is parsed leniently, so stray syntax characters in natural
    /// language never fail the search.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
        if limit == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        // TopDocs preallocates `limit` slots
        let limit = limit.min(self.len());

        let searcher = self.reader.searcher();

        let mut query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.f_content,
                self.f_file_path,
                self.f_symbols,
                self.f_namespace,
                self.f_type_name,
                self.f_member_name,
                self.f_defined_types,
                self.f_methods,
            ],
        );
        query_parser.set_field_boost(self.f_type_name, 3.0);
        query_parser.set_field_boost(self.f_member_name, 2.0);
        query_parser.set_field_boost(self.f_symbols, 1.5);

        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient BM25 parse of {query_str:?} dropped {} term(s)", errors.len());
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let Some(chunk) = doc
                .get_first(self.f_ord)
                .and_then(|v| v.as_u64())
                .and_then(|ord| self.chunks.get(ord as usize))
            else {
                continue;
            };

            hits.push(Bm25Hit {
                chunk: chunk.clone(),
                score,
            });
        }

        Ok(hits)
    }
}

/// Split identifier parts of the metadata names and the file name, so
/// "form link" matches `FormLink` and the reverse.
fn symbol_terms(chunk: &Chunk) -> String {
    let meta = &chunk.metadata;
    let file_stem = std::path::Path::new(&chunk.relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let names = [
        meta.type_name.as_deref(),
        meta.member_name.as_deref(),
        Some(file_stem.as_str()),
    ];
    names
        .into_iter()
        .flatten()
        .flat_map(identifier_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

struct CachedIndex {
    version: u64,
    index: Arc<Bm25Index>,
}

/// Lazily built lexical index, keyed by the chunk store's version.
#[derive(Default)]
pub struct LexicalCache {
    slot: RwLock<Option<CachedIndex>>,
}

impl LexicalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached index for `version`, building it from `load()` when
    /// missing or stale.
    pub fn get_or_build<F>(&self, version: u64, load: F) -> Result<Arc<Bm25Index>>
    where
        F: FnOnce() -> Vec<Chunk>,
    {
        if let Some(cached) = self.slot.read().as_ref() {
            if cached.version == version {
                return Ok(cached.index.clone());
            }
        }

        let mut slot = self.slot.write();
        // Another reader may have built it while we waited
        if let Some(cached) = slot.as_ref() {
            if cached.version == version {
                return Ok(cached.index.clone());
            }
        }

        let started = std::time::Instant::now();
        let index = Arc::new(Bm25Index::build(load())?);
        tracing::info!(
            "Built BM25 index over {} chunks in {:?} (version {version})",
            index.len(),
            started.elapsed()
        );
        *slot = Some(CachedIndex {
            version,
            index: index.clone(),
        });
        Ok(index)
    }

    /// Tear down the cached index.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    pub fn cached_version(&self) -> Option<u64> {
        self.slot.read().as_ref().map(|c| c.version)
    }
}
