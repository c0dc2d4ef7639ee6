//! Best-effort structural metadata from source text.
//!
//! Regex based on purpose: it has to work on files tree-sitter rejects or has
//! no grammar for, and an unknown language simply produces an empty summary.

use regex::Regex;

use crate::chunking::Language;
use crate::models::ChunkMetadata;

/// Identifiers that the loose member patterns can pick up from control flow.
const NOT_A_MEMBER: &[&str] = &[
    "if", "for", "foreach", "while", "switch", "catch", "using", "lock", "return", "function",
    "constructor", "else", "do", "try", "new",
];

/// A named declaration found in a file. Lines are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: String,
    pub name: String,
    pub line: usize,
    pub public: bool,
}

/// Structural summary of one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub namespaces: Vec<Declaration>,
    pub types: Vec<Declaration>,
    pub members: Vec<Declaration>,
    defined_types: Option<String>,
    methods: Option<String>,
}

impl FileMetadata {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.types.is_empty() && self.members.is_empty()
    }

    /// Metadata for a chunk spanning `start_line..=end_line`.
    pub fn for_lines(&self, start_line: usize, end_line: usize) -> ChunkMetadata {
        ChunkMetadata {
            namespace: nearest(&self.namespaces, start_line, end_line),
            type_name: nearest(&self.types, start_line, end_line),
            member_name: nearest(&self.members, start_line, end_line),
            defined_types: self.defined_types.clone(),
            methods: self.methods.clone(),
        }
    }
}

/// Last declaration at or before `start`, else the first one inside the chunk.
fn nearest(decls: &[Declaration], start: usize, end: usize) -> Option<String> {
    decls
        .iter()
        .rev()
        .find(|d| d.line <= start)
        .or_else(|| decls.iter().find(|d| d.line > start && d.line <= end))
        .map(|d| d.name.clone())
}

struct LanguagePatterns {
    namespaces: Vec<Regex>,
    types: Vec<Regex>,
    members: Vec<Regex>,
    /// Only public members go into the `methods` string
    public_methods_only: bool,
}

impl LanguagePatterns {
    fn compile(
        namespaces: &[&str],
        types: &[&str],
        members: &[&str],
        public_methods_only: bool,
    ) -> Result<Self, regex::Error> {
        let build = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            namespaces: build(namespaces)?,
            types: build(types)?,
            members: build(members)?,
            public_methods_only,
        })
    }
}

/// Regex-driven extractor for namespaces, types and members.
pub struct MetadataExtractor {
    csharp: LanguagePatterns,
    java: LanguagePatterns,
    rust: LanguagePatterns,
    script: LanguagePatterns,
    python: LanguagePatterns,
    go: LanguagePatterns,
    max_length: usize,
}

impl MetadataExtractor {
    /// `max_length` bounds the joined `defined_types` / `methods` strings.
    pub fn new(max_length: usize) -> Result<Self, regex::Error> {
        let csharp = LanguagePatterns::compile(
            &[r"(?m)^[ \t]*(?:file\s+)?namespace\s+(?P<name>[\w\.]+)"],
            &[r"(?m)^[ \t]*(?:(?:public|private|protected|internal|static|abstract|sealed|partial|readonly|ref|unsafe|file|new)\s+)*(?P<kind>class|interface|struct|enum|record)\s+(?P<name>\w+)"],
            &[r"(?m)^[ \t]*(?:(?:public|private|protected|internal|static|virtual|override|abstract|sealed|async|extern|unsafe|new|partial)\s+)+[\w<>\[\],\.\?]+\s+(?P<name>\w+)\s*(?:<[^>\n]*>)?\s*\("],
            true,
        )?;
        let java = LanguagePatterns::compile(
            &[r"(?m)^[ \t]*package\s+(?P<name>[\w\.]+)"],
            &[r"(?m)^[ \t]*(?:(?:public|private|protected|static|abstract|final|sealed|strictfp)\s+)*(?P<kind>class|interface|enum|record)\s+(?P<name>\w+)"],
            &[r"(?m)^[ \t]*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)+(?:<[^>\n]*>\s+)?[\w<>\[\],\.\?]+\s+(?P<name>\w+)\s*\("],
            true,
        )?;
        let rust = LanguagePatterns::compile(
            &[r"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?\s+)?mod\s+(?P<name>\w+)\s*\{"],
            &[
                r"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?\s+)?(?P<kind>struct|enum|trait|union)\s+(?P<name>\w+)",
                r"(?m)^[ \t]*(?:unsafe\s+)?(?P<kind>impl)(?:<[^>\n]*>)?\s+(?:[\w:]+(?:<[^>\n]*>)?\s+for\s+)?(?P<name>\w+)",
            ],
            &[r#"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"\n]*"\s+)?fn\s+(?P<name>\w+)"#],
            false,
        )?;
        let script = LanguagePatterns::compile(
            &[r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?(?:namespace|module)\s+(?P<name>[\w\.]+)"],
            &[r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?P<kind>class|interface|enum)\s+(?P<name>\w+)"],
            &[
                r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w+)",
                r"(?m)^[ \t]+(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*(?P<name>[A-Za-z_$][\w$]*)\s*\([^)\n]*\)\s*(?::\s*[^{;\n]+)?\{",
            ],
            false,
        )?;
        let python = LanguagePatterns::compile(
            &[],
            &[r"(?m)^[ \t]*(?P<kind>class)\s+(?P<name>\w+)"],
            &[r"(?m)^[ \t]*(?:async\s+)?def\s+(?P<name>\w+)"],
            false,
        )?;
        let go = LanguagePatterns::compile(
            &[r"(?m)^package\s+(?P<name>\w+)"],
            &[r"(?m)^type\s+(?P<name>\w+)\s+(?P<kind>struct|interface)"],
            &[r"(?m)^func\s+(?:\([^)\n]*\)\s*)?(?P<name>\w+)"],
            false,
        )?;

        Ok(Self {
            csharp,
            java,
            rust,
            script,
            python,
            go,
            max_length,
        })
    }

    /// Extract a summary of `text`. Unsupported languages yield an empty one.
    pub fn extract(&self, text: &str, language: Language) -> FileMetadata {
        let Some(patterns) = self.patterns_for(language) else {
            return FileMetadata::default();
        };

        let lines = LineIndex::new(text);
        let namespaces = collect(&patterns.namespaces, text, &lines, "namespace");
        let types = collect(&patterns.types, text, &lines, "type");
        let members: Vec<Declaration> = collect(&patterns.members, text, &lines, "member")
            .into_iter()
            .filter(|d| !NOT_A_MEMBER.contains(&d.name.as_str()))
            .collect();

        let defined_types = join_truncated(
            types.iter().map(|t| format!("{}:{}", t.kind, t.name)),
            self.max_length,
        );

        let mut seen: Vec<&str> = Vec::new();
        for m in &members {
            if patterns.public_methods_only && !m.public {
                continue;
            }
            if !seen.contains(&m.name.as_str()) {
                seen.push(&m.name);
            }
        }
        let methods = join_truncated(seen.iter().map(|s| s.to_string()), self.max_length);

        FileMetadata {
            namespaces,
            types,
            members,
            defined_types,
            methods,
        }
    }

    fn patterns_for(&self, language: Language) -> Option<&LanguagePatterns> {
        match language {
            Language::CSharp => Some(&self.csharp),
            Language::Java => Some(&self.java),
            Language::Rust => Some(&self.rust),
            Language::JavaScript | Language::TypeScript | Language::Tsx => Some(&self.script),
            Language::Python => Some(&self.python),
            Language::Go => Some(&self.go),
            Language::Unknown => None,
        }
    }
}

fn collect(patterns: &[Regex], text: &str, lines: &LineIndex, default_kind: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(text) {
            let Some(name) = caps.name("name") else {
                continue;
            };
            let kind = caps
                .name("kind")
                .map(|k| k.as_str())
                .unwrap_or(default_kind);
            let public = caps
                .get(0)
                .map(|m| m.as_str().trim_start().starts_with("pub"))
                .unwrap_or(false);
            out.push(Declaration {
                kind: kind.to_string(),
                name: name.as_str().to_string(),
                line: lines.line_of(name.start()),
                public,
            });
        }
    }
    // Several patterns per group: restore source order
    out.sort_by_key(|d| d.line);
    out
}

fn join_truncated(items: impl Iterator<Item = String>, max_length: usize) -> Option<String> {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        return None;
    }
    if joined.chars().count() <= max_length {
        return Some(joined);
    }
    let keep = max_length.saturating_sub(3);
    let mut truncated: String = joined.chars().take(keep).collect();
    truncated.push_str("...");
    Some(truncated)
}

/// Byte offset to 1-based line lookups.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        Self {
            newlines: text
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSHARP: &str = r#"using System;

namespace Contoso.Forms
{
    public class FormLink : ILink
    {
        private readonly string _target;

        public FormLink(string target)
        {
            _target = target;
        }

        public async Task<bool> OpenAsync(int timeout)
        {
            if (timeout < 0) return false;
            return await Navigate(_target);
        }

        private bool Navigate(string target)
        {
            return true;
        }
    }

    internal interface ILink
    {
    }
}
"#;

    fn extractor() -> MetadataExtractor {
        MetadataExtractor::new(500).unwrap()
    }

    #[test]
    fn test_csharp_declarations() {
        let meta = extractor().extract(CSHARP, Language::CSharp);
        assert_eq!(meta.namespaces.len(), 1);
        assert_eq!(meta.namespaces[0].name, "Contoso.Forms");
        assert_eq!(meta.namespaces[0].line, 3);

        let types: Vec<(&str, &str)> = meta
            .types
            .iter()
            .map(|t| (t.kind.as_str(), t.name.as_str()))
            .collect();
        assert_eq!(types, vec![("class", "FormLink"), ("interface", "ILink")]);

        let members: Vec<&str> = meta.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["OpenAsync", "Navigate"]);
    }

    #[test]
    fn test_csharp_file_level_strings() {
        let meta = extractor().extract(CSHARP, Language::CSharp);
        let chunk = meta.for_lines(1, 10);
        assert_eq!(
            chunk.defined_types.as_deref(),
            Some("class:FormLink, interface:ILink")
        );
        // only public members
        assert_eq!(chunk.methods.as_deref(), Some("OpenAsync"));
    }

    #[test]
    fn test_nearest_enclosing_names() {
        let meta = extractor().extract(CSHARP, Language::CSharp);

        let inside_open = meta.for_lines(16, 18);
        assert_eq!(inside_open.namespace.as_deref(), Some("Contoso.Forms"));
        assert_eq!(inside_open.type_name.as_deref(), Some("FormLink"));
        assert_eq!(inside_open.member_name.as_deref(), Some("OpenAsync"));

        // chunk starting before any declaration picks the first one inside it
        let header = meta.for_lines(1, 6);
        assert_eq!(header.namespace.as_deref(), Some("Contoso.Forms"));
        assert_eq!(header.type_name.as_deref(), Some("FormLink"));
        assert_eq!(header.member_name, None);
    }

    #[test]
    fn test_rust_declarations() {
        let src = "pub struct Store {\n    items: Vec<u8>,\n}\n\nimpl<T> Display for Wrapper<T> {\n    fn fmt(&self) {}\n}\n\nimpl Store {\n    pub async fn load() {}\n}\n";
        let meta = extractor().extract(src, Language::Rust);
        let types: Vec<(&str, &str)> = meta
            .types
            .iter()
            .map(|t| (t.kind.as_str(), t.name.as_str()))
            .collect();
        assert_eq!(
            types,
            vec![("struct", "Store"), ("impl", "Wrapper"), ("impl", "Store")]
        );
        let members: Vec<&str> = meta.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["fmt", "load"]);
        assert_eq!(meta.for_lines(10, 10).type_name.as_deref(), Some("Store"));
    }

    #[test]
    fn test_python_declarations() {
        let src = "class Loader:\n    def load(self):\n        pass\n\nasync def main():\n    pass\n";
        let meta = extractor().extract(src, Language::Python);
        assert_eq!(meta.types[0].name, "Loader");
        let members: Vec<&str> = meta.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["load", "main"]);
        assert!(meta.namespaces.is_empty());
    }

    #[test]
    fn test_typescript_skips_control_flow() {
        let src = "export class Service {\n    process(input: string): string {\n        if (input) {\n            return input;\n        }\n    }\n}\n";
        let meta = extractor().extract(src, Language::TypeScript);
        let members: Vec<&str> = meta.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["process"]);
    }

    #[test]
    fn test_unknown_language_is_empty() {
        let meta = extractor().extract("class Foo {}", Language::Unknown);
        assert!(meta.is_empty());
        assert!(meta.for_lines(1, 1).is_empty());
    }

    #[test]
    fn test_truncation_appends_ellipsis() {
        let names = (0..100).map(|i| format!("Method{i}"));
        let joined = join_truncated(names, 50).unwrap();
        assert_eq!(joined.chars().count(), 50);
        assert!(joined.ends_with("..."));
    }

    #[test]
    fn test_duplicate_methods_listed_once() {
        let src = "class A {\n    public void Run() {}\n    public void Run(int x) {}\n}\n";
        let meta = extractor().extract(src, Language::CSharp);
        assert_eq!(meta.for_lines(1, 4).methods.as_deref(), Some("Run"));
    }
}
