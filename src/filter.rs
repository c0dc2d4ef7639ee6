//! File eligibility.
//!
//! [`FileFilterer::accepts`] works on path strings alone so it can be checked
//! against literal paths without touching the filesystem. Content-based
//! detection of generated files is a separate step the indexer runs after
//! reading a file.

use std::path::{Component, Path};

use crate::config::FilterConfig;

/// Decides which files and directories are indexed.
#[derive(Debug, Clone)]
pub struct FileFilterer {
    config: FilterConfig,
}

impl FileFilterer {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Accept or reject a path, normally relative to its repository root.
    pub fn accepts(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        if self.has_generated_suffix(&path_str) {
            return false;
        }

        if path.components().any(|c| match c {
            Component::Normal(seg) => self.is_excluded_dir(&seg.to_string_lossy()),
            _ => false,
        }) {
            return false;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.config.extensions.iter().any(|allowed| *allowed == ext)
    }

    /// Exact, case-sensitive match against the excluded directory names.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.config.excluded_dirs.iter().any(|d| d == name)
    }

    fn has_generated_suffix(&self, path: &str) -> bool {
        self.config
            .generated_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
    }

    /// True when a generated-code marker appears near the top of the file.
    pub fn is_generated_content(&self, text: &str) -> bool {
        let header_end = text
            .char_indices()
            .nth(self.config.header_check_chars)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let header = &text[..header_end];
        self.config
            .generated_markers
            .iter()
            .any(|marker| header.contains(marker.as_str()))
    }
}

impl Default for FileFilterer {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(path: &str) -> bool {
        FileFilterer::default().accepts(Path::new(path))
    }

    #[test]
    fn test_accepts_plain_source_files() {
        assert!(accepts("A.cs"));
        assert!(accepts("src/Forms/FormLink.cs"));
        assert!(accepts("src/lib.rs"));
        assert!(accepts("web/app.tsx"));
        assert!(accepts("tools/gen.py"));
    }

    #[test]
    fn test_rejects_generated_suffixes() {
        assert!(!accepts("A.g.cs"));
        assert!(!accepts("src/A.g.i.cs"));
        assert!(!accepts("Forms/Main.Designer.cs"));
        assert!(!accepts("Proto/Messages.generated.cs"));
        assert!(!accepts("obj/Debug/net8.0/App.AssemblyAttributes.cs"));
    }

    #[test]
    fn test_rejects_excluded_directories() {
        assert!(!accepts("bin/Debug/Program.cs"));
        assert!(!accepts("src/obj/Thing.cs"));
        assert!(!accepts("web/node_modules/react/index.js"));
        assert!(!accepts(".git/hooks/pre-commit.py"));
    }

    #[test]
    fn test_excluded_directory_match_is_exact_and_case_sensitive() {
        assert!(accepts("Bin/Program.cs"));
        assert!(accepts("binary/Program.cs"));
        assert!(accepts("src/objects/Thing.cs"));
    }

    #[test]
    fn test_excluded_name_as_file_stem_is_not_a_directory_match() {
        // "target" is excluded as a directory; a file merely named like it is not
        assert!(accepts("src/target.rs"));
    }

    #[test]
    fn test_rejects_unknown_extensions() {
        assert!(!accepts("README.md"));
        assert!(!accepts("assets/logo.png"));
        assert!(!accepts("Makefile"));
    }

    #[test]
    fn test_extension_match_ignores_case() {
        assert!(accepts("Legacy/OLD.CS"));
    }

    #[test]
    fn test_custom_configuration() {
        let filter = FileFilterer::new(FilterConfig {
            extensions: vec!["md".to_string()],
            generated_suffixes: vec![".auto.md".to_string()],
            excluded_dirs: vec!["drafts".to_string()],
            ..FilterConfig::default()
        });
        assert!(filter.accepts(Path::new("docs/guide.md")));
        assert!(!filter.accepts(Path::new("docs/api.auto.md")));
        assert!(!filter.accepts(Path::new("drafts/guide.md")));
        assert!(!filter.accepts(Path::new("src/lib.rs")));
    }

    #[test]
    fn test_generated_content_marker_in_header() {
        let filter = FileFilterer::default();
        let text = "// <auto-generated>\n//     This code was generated by a tool.\n// </auto-generated>\nclass A {}";
        assert!(filter.is_generated_content(text));
        assert!(!filter.is_generated_content("class A {}\n"));
    }

    #[test]
    fn test_generated_marker_past_header_is_ignored() {
        let filter = FileFilterer::default();
        let text = format!("{}\n// @generated\n", "x".repeat(2000));
        assert!(!filter.is_generated_content(&text));
    }
}
