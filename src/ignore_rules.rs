//! Ignore-file parsing and matching
//!
//! Compiles gitignore-dialect lines into a predicate over upload-relative
//! paths. Matching is delegated to the `ignore` crate, so `*`, `**`,
//! directory-only patterns (`build/`), negation (`!keep.log`) and anchoring
//! (`/dist`) all follow git's rules, including "last matching line wins".
//!
//! A line that fails to compile is skipped with a warning; the remaining
//! lines still apply.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Compiled ignore rules for one upload root
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    gitignore: Gitignore,
    source: Option<PathBuf>,
    skipped_lines: Vec<String>,
}

impl IgnoreMatcher {
    /// A matcher that ignores nothing
    pub fn none() -> Self {
        Self {
            gitignore: Gitignore::empty(),
            source: None,
            skipped_lines: Vec::new(),
        }
    }

    /// Compile pattern lines rooted at `root`
    pub fn compile<I, S>(root: &Path, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        let mut skipped_lines = Vec::new();

        for line in lines {
            let line = line.as_ref();
            if let Err(e) = builder.add_line(None, line) {
                warn!("Skipping malformed ignore pattern '{}': {}", line, e);
                skipped_lines.push(line.to_string());
            }
        }

        let gitignore = match builder.build() {
            Ok(gitignore) => gitignore,
            Err(e) => {
                warn!("Failed to build ignore rules, ignoring nothing: {}", e);
                Gitignore::empty()
            }
        };

        debug!("Compiled {} ignore rules", gitignore.num_ignores() + gitignore.num_whitelists());

        Self {
            gitignore,
            source: None,
            skipped_lines,
        }
    }

    /// Load `file_name` from the root of the tree, if present
    pub fn load(root: &Path, file_name: &str) -> std::io::Result<Self> {
        let path = root.join(file_name);
        if !path.is_file() {
            debug!("No ignore file at {}", path.display());
            return Ok(Self::none());
        }

        let content = std::fs::read_to_string(&path)?;
        let mut matcher = Self::compile(root, content.lines());
        matcher.source = Some(PathBuf::from(file_name));
        Ok(matcher)
    }

    /// Ignore file these rules were read from, relative to the root
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Lines that could not be compiled
    pub fn skipped_lines(&self) -> &[String] {
        &self.skipped_lines
    }

    /// Whether a file at `relative_path` is ignored
    pub fn matches(&self, relative_path: &str) -> bool {
        self.is_match(relative_path, false)
    }

    /// Whether a directory at `relative_path` is ignored
    pub fn matches_dir(&self, relative_path: &str) -> bool {
        self.is_match(relative_path, true)
    }

    fn is_match(&self, relative_path: &str, is_dir: bool) -> bool {
        if self.gitignore.is_empty() || relative_path.is_empty() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(Path::new(relative_path), is_dir)
            .is_ignore()
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn matcher(lines: &[&str]) -> IgnoreMatcher {
        IgnoreMatcher::compile(Path::new("/project"), lines.iter().copied())
    }

    #[test]
    fn test_no_rules_matches_nothing() {
        let m = IgnoreMatcher::none();
        assert!(!m.matches("a.txt"));
        assert!(!m.matches("build/out.bin"));
        assert!(!m.matches_dir("node_modules"));
        assert!(m.source().is_none());
    }

    #[test]
    fn test_directory_only_pattern() {
        let m = matcher(&["build/"]);
        assert!(m.matches("build/out.bin"));
        assert!(m.matches("build/nested/deep.o"));
        assert!(m.matches_dir("build"));
        // A plain file named "build" is not a directory
        assert!(!m.matches("build"));
        assert!(!m.matches("a.txt"));
    }

    #[test]
    fn test_wildcards() {
        let m = matcher(&["*.log", "docs/**/*.tmp"]);
        assert!(m.matches("debug.log"));
        assert!(m.matches("logs/server.log"));
        assert!(m.matches("docs/a/b/c.tmp"));
        assert!(m.matches("docs/c.tmp"));
        assert!(!m.matches("src/c.tmp"));
        assert!(!m.matches("main.rs"));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let m = matcher(&["*.log", "!keep.log"]);
        assert!(m.matches("debug.log"));
        assert!(!m.matches("keep.log"));

        let reversed = matcher(&["!keep.log", "*.log"]);
        assert!(reversed.matches("keep.log"));
    }

    #[test]
    fn test_anchored_pattern() {
        let m = matcher(&["/dist"]);
        assert!(m.matches("dist/bundle.js"));
        assert!(!m.matches("web/dist/bundle.js"));

        let unanchored = matcher(&["dist"]);
        assert!(unanchored.matches("web/dist/bundle.js"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let m = matcher(&["# build output", "", "   ", "target/"]);
        assert!(m.matches("target/debug/app"));
        assert!(!m.matches("# build output"));
        assert!(m.skipped_lines().is_empty());
    }

    #[test]
    fn test_malformed_pattern_is_skipped() {
        let m = matcher(&["foo[", "*.bak"]);
        assert_eq!(m.skipped_lines(), &["foo[".to_string()]);
        assert!(m.matches("old.bak"));
        assert!(!m.matches("foo["));
    }

    #[test]
    fn test_load_from_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".gitignore"), "build/\n*.log\n").unwrap();

        let m = IgnoreMatcher::load(temp_dir.path(), ".gitignore").unwrap();
        assert_eq!(m.source(), Some(Path::new(".gitignore")));
        assert!(m.matches("build/out.bin"));
        assert!(m.matches("trace.log"));
        assert!(!m.matches("a.txt"));
    }

    #[test]
    fn test_load_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let m = IgnoreMatcher::load(temp_dir.path(), ".gitignore").unwrap();
        assert!(m.source().is_none());
        assert!(!m.matches("anything"));
    }
}
