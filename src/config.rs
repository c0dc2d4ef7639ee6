use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::index::parse_repository_paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the persisted index is stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Repository roots indexed when a refresh names none
    pub repository_paths: Vec<PathBuf>,
    /// File eligibility rules
    pub filter: FilterConfig,
    /// Chunk window sizes
    pub chunking: ChunkingConfig,
    /// Batch insertion and file limits
    pub indexing: IndexingConfig,
    /// Candidate pool sizes and lexical toggle
    pub search: SearchConfig,
    /// Embedding provider configuration
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
}

/// Which files are eligible for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Lowercase extensions without the leading dot
    pub extensions: Vec<String>,
    /// Path suffixes that mark generated code (matched case-sensitively)
    pub generated_suffixes: Vec<String>,
    /// Directory names that are never descended into
    pub excluded_dirs: Vec<String>,
    /// Header markers that flag a file as generated
    pub generated_markers: Vec<String>,
    /// How many leading characters are scanned for markers
    pub header_check_chars: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: ["cs", "rs", "py", "js", "jsx", "ts", "tsx", "java", "go"]
                .into_iter()
                .map(String::from)
                .collect(),
            generated_suffixes: [
                ".g.cs",
                ".g.i.cs",
                ".Designer.cs",
                ".designer.cs",
                ".generated.cs",
                ".AssemblyInfo.cs",
                ".AssemblyAttributes.cs",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_dirs: [
                ".git",
                ".vs",
                ".idea",
                "bin",
                "obj",
                "node_modules",
                "target",
                "packages",
                "dist",
                "build",
                "__pycache__",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            generated_markers: [
                "<auto-generated",
                "<autogenerated",
                "This code was generated by a tool",
                "@generated",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            header_check_chars: 1000,
        }
    }
}

/// Line windows used by the chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum lines per chunk
    pub chunk_lines: usize,
    /// Lines shared by consecutive chunks
    pub overlap_lines: usize,
    /// Hard cap on characters per chunk
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_lines: 40,
            overlap_lines: 15,
            max_chars: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Target number of chunks per insertion batch
    pub batch_size: usize,
    /// Files larger than this are skipped (bytes)
    pub max_file_bytes: u64,
    /// Truncation length for the `defined_types` / `methods` metadata strings
    pub metadata_max_length: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_file_bytes: 1_048_576,
            metadata_max_length: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned when a caller gives no `top_k`
    pub default_top_k: usize,
    /// Semantic candidates fetched per requested result
    pub vector_multiplier: usize,
    /// Lexical candidates fetched per requested result
    pub bm25_multiplier: usize,
    /// Fused candidates handed to the reranker per requested result
    pub fusion_multiplier: usize,
    /// Reciprocal rank fusion constant
    pub rrf_k: f32,
    /// Set to false to serve semantic-only results
    pub lexical_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            vector_multiplier: 2,
            bm25_multiplier: 2,
            fusion_multiplier: 3,
            rrf_k: 60.0,
            lexical_enabled: true,
        }
    }
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server with a reranker model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, results keep their fused order.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "hash", "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Vector dimension of the `hash` provider. HTTP models fix their own.
    pub embedding_dim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            repository_paths: Vec::new(),
            filter: FilterConfig::default(),
            chunking: ChunkingConfig::default(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 384,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("REPO_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("REPO_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(paths) = std::env::var("REPO_RAG_REPOSITORY_PATHS") {
            config.repository_paths = parse_repository_paths(&paths);
        }

        // Filter config
        if let Ok(val) = std::env::var("REPO_RAG_EXTENSIONS") {
            config.filter.extensions = split_list(&val)
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect();
        }
        if let Ok(val) = std::env::var("REPO_RAG_EXCLUDED_DIRS") {
            config.filter.excluded_dirs = split_list(&val);
        }
        if let Ok(val) = std::env::var("REPO_RAG_GENERATED_SUFFIXES") {
            config.filter.generated_suffixes = split_list(&val);
        }

        // Chunking config
        if let Ok(val) = std::env::var("REPO_RAG_CHUNK_LINES") {
            if let Ok(v) = val.parse::<usize>() {
                config.chunking.chunk_lines = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_CHUNK_OVERLAP_LINES") {
            if let Ok(v) = val.parse() {
                config.chunking.overlap_lines = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_MAX_CHARS") {
            if let Ok(v) = val.parse::<usize>() {
                config.chunking.max_chars = v.max(1);
            }
        }

        // Indexing config
        if let Ok(val) = std::env::var("REPO_RAG_BATCH_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.indexing.batch_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_MAX_FILE_BYTES") {
            if let Ok(v) = val.parse() {
                config.indexing.max_file_bytes = v;
            }
        }

        // Search config
        if let Ok(val) = std::env::var("REPO_RAG_DEFAULT_TOP_K") {
            if let Ok(v) = val.parse() {
                config.search.default_top_k = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_VECTOR_MULTIPLIER") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.vector_multiplier = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_BM25_MULTIPLIER") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.bm25_multiplier = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_FUSION_MULTIPLIER") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.fusion_multiplier = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("REPO_RAG_LEXICAL_ENABLED") {
            if let Ok(v) = val.parse() {
                config.search.lexical_enabled = v;
            }
        }

        // Embedding provider config
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Reranker config
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
