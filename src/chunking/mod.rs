//! Code chunking: overlapping line windows that prefer to end on structural
//! boundaries found by tree-sitter, with plain windows for everything else.

pub mod ast;
pub mod window;

use std::path::Path;

use crate::config::ChunkingConfig;

/// Output of the chunking process.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutput {
    pub content: String,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
    /// Byte offset of the chunk's first character in the original file.
    pub byte_offset: usize,
}

/// Source languages the indexer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    CSharp,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
    Python,
    Go,
    Unknown,
}

impl Language {
    /// Map a file extension / language name string to a Language variant.
    pub fn from_name(lang: &str) -> Self {
        match lang.to_lowercase().as_str() {
            "csharp" | "c#" | "cs" => Language::CSharp,
            "rust" | "rs" => Language::Rust,
            "javascript" | "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "java" => Language::Java,
            "python" | "py" => Language::Python,
            "go" => Language::Go,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|e| Self::from_name(&e.to_string_lossy()))
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::CSharp => "csharp",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Java => "java",
            Language::Python => "python",
            Language::Go => "go",
            Language::Unknown => "text",
        }
    }

    /// Return the tree-sitter Language for this variant, or None if unsupported.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Java | Language::Python | Language::Go | Language::Unknown => None,
        }
    }

    /// Node kinds whose end marks a good place to close a chunk.
    pub(crate) fn boundary_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::CSharp => &[
                "namespace_declaration",
                "class_declaration",
                "struct_declaration",
                "interface_declaration",
                "enum_declaration",
                "record_declaration",
                "method_declaration",
                "constructor_declaration",
                "property_declaration",
                "local_function_statement",
            ],
            Language::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "mod_item",
                "const_item",
                "static_item",
                "type_item",
                "macro_definition",
            ],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
                "method_definition",
                "lexical_declaration",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
                "export_statement",
            ],
            Language::Java | Language::Python | Language::Go | Language::Unknown => &[],
        }
    }
}

/// Chunk source code for the given language.
///
/// Structural boundaries are used when the language has a grammar and the
/// file parses cleanly; otherwise windows end at the line budget.
pub fn chunk_code(content: &str, language: Language, config: &ChunkingConfig) -> Vec<ChunkOutput> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let boundaries = match ast::structural_boundaries(content, language) {
        Ok(Some(boundaries)) => boundaries,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::debug!("{e}; using fixed line windows");
            Vec::new()
        }
    };

    window::split_windows(content, &boundaries, config)
}
