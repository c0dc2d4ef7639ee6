//! Structural chunk boundaries from tree-sitter.
//!
//! A boundary is the line right after a declaration node ends (type, member,
//! function...). The window splitter prefers to close chunks there.
//!
//! No boundaries are produced when:
//! - File exceeds MAX_FILE_SIZE (500 KB)
//! - Parse produces >30% error nodes
//! - Language has no grammar

use super::Language;
use crate::error::{Error, Result};

/// Files larger than this skip AST parsing entirely.
const MAX_FILE_SIZE: usize = 500 * 1024; // 500 KB

/// If more than this fraction of AST nodes are error nodes, fall back.
const ERROR_THRESHOLD: f64 = 0.30;

/// Sorted, deduplicated exclusive end lines (0-based line index + 1) of
/// declaration nodes. `Ok(None)` when the language has no grammar.
pub fn structural_boundaries(content: &str, language: Language) -> Result<Option<Vec<usize>>> {
    let Some(ts_language) = language.tree_sitter_language() else {
        return Ok(None);
    };

    if content.len() > MAX_FILE_SIZE {
        return Err(parse_error(
            language,
            format!("{} bytes exceeds the {MAX_FILE_SIZE} byte parse limit", content.len()),
        ));
    }

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| parse_error(language, e))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| parse_error(language, "parser returned no tree"))?;
    let root = tree.root_node();

    // Check error rate
    let (total, errors) = count_nodes(root);
    if total > 0 && (errors as f64 / total as f64) > ERROR_THRESHOLD {
        return Err(parse_error(
            language,
            format!(
                "AST error rate {:.0}% exceeds threshold",
                (errors as f64 / total as f64) * 100.0
            ),
        ));
    }

    let kinds = language.boundary_kinds();
    let mut boundaries = Vec::new();
    collect_boundaries(root, kinds, &mut boundaries);
    boundaries.sort_unstable();
    boundaries.dedup();
    Ok(Some(boundaries))
}

fn collect_boundaries(node: tree_sitter::Node, kinds: &[&str], out: &mut Vec<usize>) {
    if kinds.contains(&node.kind()) {
        out.push(node.end_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_boundaries(child, kinds, out);
    }
}

fn parse_error(language: Language, message: impl std::fmt::Display) -> Error {
    Error::Parse {
        language: language.as_str(),
        message: message.to_string(),
    }
}

/// Count total nodes and error nodes in a tree.
fn count_nodes(node: tree_sitter::Node) -> (usize, usize) {
    let mut total = 1usize;
    let mut errors = if node.is_error() { 1usize } else { 0 };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let (t, e) = count_nodes(child);
        total += t;
        errors += e;
    }

    (total, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_function_boundaries() {
        let source = "fn hello() {\n    println!(\"hello\");\n}\n\nfn world() {\n    println!(\"world\");\n}\n";
        let boundaries = structural_boundaries(source, Language::Rust).unwrap().unwrap();
        assert_eq!(boundaries, vec![3, 7]);
    }

    #[test]
    fn test_nested_declarations_are_included() {
        let source = r#"struct Foo {
    bar: i32,
}

impl Foo {
    fn new() -> Self {
        Foo { bar: 0 }
    }
}
"#;
        let boundaries = structural_boundaries(source, Language::Rust).unwrap().unwrap();
        // struct, fn new, impl block
        assert_eq!(boundaries, vec![3, 8, 9]);
    }

    #[test]
    fn test_csharp_class_and_methods() {
        let source = "public class A\n{\n    public void One()\n    {\n    }\n\n    public void Two()\n    {\n    }\n}\n";
        let boundaries = structural_boundaries(source, Language::CSharp).unwrap().unwrap();
        assert!(boundaries.contains(&5));
        assert!(boundaries.contains(&9));
        assert!(boundaries.contains(&10));
    }

    #[test]
    fn test_typescript_boundaries() {
        let source = r#"interface Config {
    name: string;
}

function processConfig(config: Config): string {
    return config.name;
}
"#;
        let boundaries = structural_boundaries(source, Language::TypeScript)
            .unwrap()
            .unwrap();
        assert!(boundaries.contains(&3));
        assert!(boundaries.contains(&7));
    }

    #[test]
    fn test_large_files_are_rejected() {
        let large = "x".repeat(MAX_FILE_SIZE + 1);
        let err = structural_boundaries(&large, Language::Rust).unwrap_err();
        assert!(matches!(err, Error::Parse { language: "rust", .. }));
    }

    #[test]
    fn test_unsupported_language_returns_none() {
        assert!(structural_boundaries("some text", Language::Unknown)
            .unwrap()
            .is_none());
        assert!(structural_boundaries("def f(): pass", Language::Python)
            .unwrap()
            .is_none());
    }
}
