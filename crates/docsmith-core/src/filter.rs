//! Path exclusion filter.
//!
//! Both the ingestor and the Merkle commitment run every candidate path
//! through the same filter so that documentation is always computed over a
//! stable subset of the repository. Matching is case-insensitive; `*` stays
//! within a path segment while `**` crosses any number of segments.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;

/// Directory names excluded wherever they appear in a path.
const EXCLUDED_DIRS: &[&str] = &[
    // Version-control metadata
    ".git",
    ".github",
    // Dependency and build outputs
    "node_modules",
    "dist",
    "build",
    ".next",
    "out",
    "target",
    "venv",
    "__pycache__",
    // Test directories
    "test",
    "tests",
    "__tests__",
    "spec",
    "specs",
    "coverage",
    "cypress",
    "e2e",
];

/// File extensions for binary media, archives, office documents and
/// executables that never participate in documentation.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tiff",
    // Audio / video
    "mp3", "wav", "ogg", "flac", "mp4", "avi", "mov", "mkv", "webm",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Archives
    "zip", "tar", "gz", "bz2", "xz", "7z", "rar",
    // Office documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Executables and binaries
    "exe", "dll", "so", "dylib", "bin", "o", "a", "class", "pyc", "wasm",
];

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid exclusion pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// Compiled set of exclusion patterns.
///
/// Construction validates every pattern up front; `is_excluded` itself is a
/// pure function and cannot fail.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    set: GlobSet,
}

impl ExclusionFilter {
    /// Compile an explicit pattern list.
    pub fn new<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|source| FilterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| FilterError::InvalidPattern {
            pattern: "<set>".to_string(),
            source,
        })?;
        Ok(Self { set })
    }

    /// The default pattern set: VCS metadata, build outputs, test
    /// directories, hidden dotfiles and binary extensions.
    pub fn default_set() -> Self {
        Self::new(default_patterns()).expect("default exclusion patterns are valid")
    }

    /// Whether `path` (a POSIX-style relative path) is excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.set.is_match(path)
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::default_set()
    }
}

/// Expand the default directory/extension lists into glob patterns.
pub fn default_patterns() -> Vec<String> {
    let mut patterns = Vec::new();
    for dir in EXCLUDED_DIRS {
        // The directory itself, at any depth, and everything beneath it.
        patterns.push(format!("**/{dir}"));
        patterns.push(format!("**/{dir}/**"));
    }
    // Hidden dotfiles and dot-directories.
    patterns.push("**/.*".to_string());
    patterns.push("**/.*/**".to_string());
    for ext in EXCLUDED_EXTENSIONS {
        patterns.push(format!("**/*.{ext}"));
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_vcs_and_build_directories() {
        let filter = ExclusionFilter::default_set();
        assert!(filter.is_excluded(".git/HEAD"));
        assert!(filter.is_excluded("node_modules/react/index.js"));
        assert!(filter.is_excluded("packages/app/node_modules/lodash/lodash.js"));
        assert!(filter.is_excluded("target/debug/build.rs"));
        assert!(filter.is_excluded("dist"));
    }

    #[test]
    fn excludes_test_directories() {
        let filter = ExclusionFilter::default_set();
        assert!(filter.is_excluded("tests/integration.rs"));
        assert!(filter.is_excluded("src/__tests__/app.test.ts"));
        assert!(filter.is_excluded("spec/models/user_spec.rb"));
    }

    #[test]
    fn excludes_hidden_files_and_binary_extensions() {
        let filter = ExclusionFilter::default_set();
        assert!(filter.is_excluded(".env"));
        assert!(filter.is_excluded("config/.secrets/key"));
        assert!(filter.is_excluded("assets/logo.png"));
        assert!(filter.is_excluded("docs/manual.pdf"));
        assert!(filter.is_excluded("pkg/module.wasm"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let filter = ExclusionFilter::default_set();
        assert!(filter.is_excluded("Assets/Logo.PNG"));
        assert!(filter.is_excluded("NODE_MODULES/pkg/index.js"));
    }

    #[test]
    fn keeps_ordinary_source_files() {
        let filter = ExclusionFilter::default_set();
        assert!(!filter.is_excluded("src/main.rs"));
        assert!(!filter.is_excluded("README.md"));
        assert!(!filter.is_excluded("lib/deep/nested/module.ts"));
        // "test" must match as a whole segment, not a substring.
        assert!(!filter.is_excluded("src/contest.rs"));
        assert!(!filter.is_excluded("attestation/proof.rs"));
    }

    #[test]
    fn star_stays_within_a_segment() {
        let filter = ExclusionFilter::new(["src/*.rs"]).unwrap();
        assert!(filter.is_excluded("src/main.rs"));
        assert!(!filter.is_excluded("src/nested/main.rs"));
    }

    #[test]
    fn double_star_crosses_segments_including_zero() {
        let filter = ExclusionFilter::new(["**/generated/**"]).unwrap();
        assert!(filter.is_excluded("generated/api.ts"));
        assert!(filter.is_excluded("src/deep/generated/api.ts"));
        assert!(!filter.is_excluded("src/generated.ts"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let err = ExclusionFilter::new(["src/[unclosed"]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
    }

    #[test]
    fn leading_slash_is_normalized() {
        let filter = ExclusionFilter::default_set();
        assert!(filter.is_excluded("/node_modules/pkg/index.js"));
    }
}
