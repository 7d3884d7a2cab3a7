//! Which tracked files take part in scoring.
//!
//! A `.gitfamignore` file at the repository root uses `.gitignore` syntax
//! (`#` comments, `!` negation, a leading `/` anchors to the root, a trailing
//! `/` matches only directories). Without one, lock files, vendored
//! directories, minified bundles and generated code are skipped.

use std::path::Path;

use gitfam_core::FamError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

/// Name of the per-repository ignore file.
pub const IGNORE_FILE: &str = ".gitfamignore";

const DEFAULT_PATTERNS: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    "vendor/",
    "third_party/",
    "node_modules/",
    "dist/",
    "build/",
    "*.min.js",
    "*.min.css",
    "*.map",
    "*.pb.go",
    "*_pb2.py",
    "*.generated.ts",
    "*.g.dart",
];

/// Path include/exclude decision.
///
/// # Examples
///
/// ```
/// use gitfam_gitpulse::filter::PathFilter;
///
/// let filter = PathFilter::default();
/// assert!(!filter.includes("Cargo.lock"));
/// assert!(!filter.includes("web/node_modules/react/index.js"));
/// assert!(filter.includes("src/main.rs"));
///
/// let custom = PathFilter::from_patterns("docs/\n*.snap\n");
/// assert!(!custom.includes("docs/guide.md"));
/// assert!(!custom.includes("tests/snapshots/a.snap"));
/// assert!(custom.includes("Cargo.lock"));
/// ```
#[derive(Debug, Clone)]
pub struct PathFilter {
    matcher: Gitignore,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::build(DEFAULT_PATTERNS.iter().copied())
    }
}

impl PathFilter {
    /// Parse the contents of an ignore file. Invalid patterns are skipped.
    pub fn from_patterns(content: &str) -> Self {
        Self::build(content.lines())
    }

    fn build<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut builder = GitignoreBuilder::new("");
        for line in lines {
            if let Err(e) = builder.add_line(None, line) {
                debug!(pattern = line, error = %e, "ignoring invalid pattern");
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build ignore rules, scoring every file");
            Gitignore::empty()
        });
        Self { matcher }
    }

    /// Load `.gitfamignore` from `repo_root`, or fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FamError::Io`] if the file exists but cannot be read.
    pub fn load(repo_root: &Path) -> Result<Self, FamError> {
        let path = repo_root.join(IGNORE_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Self::from_patterns(&content))
    }

    /// Whether `path` (slash-separated, repository-relative) is scored.
    pub fn includes(&self, path: &str) -> bool {
        !self
            .matcher
            .matched_path_or_any_parents(path, false)
            .is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_skip_noise() {
        let filter = PathFilter::default();
        for path in [
            "yarn.lock",
            "sub/go.sum",
            "vendor/x/y.go",
            "app/dist/bundle.js",
            "static/app.min.js",
            "api/service.pb.go",
        ] {
            assert!(!filter.includes(path), "{path} should be skipped");
        }
        for path in ["src/lib.rs", "README.md", "build.rs", "distance.rs"] {
            assert!(filter.includes(path), "{path} should be kept");
        }
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let filter = PathFilter::from_patterns("# comment\n\n/generated/\n*.json\n");
        assert!(!filter.includes("generated/a.rs"));
        assert!(!filter.includes("config/settings.json"));
        assert!(filter.includes("yarn.lock"));
        assert!(filter.includes("src/generator.rs"));
    }

    #[test]
    fn anchored_directory_only_matches_at_root() {
        let filter = PathFilter::from_patterns("/generated/\n");
        assert!(!filter.includes("generated/a.rs"));
        assert!(filter.includes("src/generated/a.rs"));
    }

    #[test]
    fn negation_reincludes_a_file() {
        let filter = PathFilter::from_patterns("*.lock\n!Cargo.lock\n");
        assert!(!filter.includes("yarn.lock"));
        assert!(filter.includes("Cargo.lock"));
    }

    #[test]
    fn load_reads_ignore_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IGNORE_FILE), "*.md\n").unwrap();
        let filter = PathFilter::load(dir.path()).unwrap();
        assert!(!filter.includes("README.md"));

        let empty = tempfile::tempdir().unwrap();
        assert!(!PathFilter::load(empty.path()).unwrap().includes("Cargo.lock"));
    }
}
