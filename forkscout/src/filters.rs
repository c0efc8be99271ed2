/// Path filtering for corpus loading.
///
/// Directory inputs are walked recursively and every file passes through a
/// [`CorpusFilter`] before it is read. Glob ignore patterns are compiled once
/// when the filter is built, so a bad pattern is reported up front instead of
/// being silently skipped for every file.
use glob::Pattern as GlobPattern;
use std::path::Path;

use crate::errors::{SearchError, SearchResult};

// Extensions that never hold searchable text
const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "obj", "o", "class", "jar", "png", "jpg", "jpeg", "gif",
    "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "7z", "rar",
];

/// Decides which files under a directory become documents
#[derive(Debug, Clone, Default)]
pub struct CorpusFilter {
    extensions: Option<Vec<String>>,
    ignore: Vec<GlobPattern>,
}

impl CorpusFilter {
    /// Builds a filter from an optional extension allow-list and glob ignore patterns
    pub fn new(extensions: Option<Vec<String>>, ignore_patterns: &[String]) -> SearchResult<Self> {
        let ignore = ignore_patterns
            .iter()
            .map(|p| {
                GlobPattern::new(p).map_err(|e| {
                    SearchError::config_error(format!("Invalid ignore pattern '{}': {}", p, e))
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self { extensions, ignore })
    }

    /// Returns true when the file at `path` should be loaded
    pub fn includes(&self, path: &Path) -> bool {
        !is_likely_binary(path) && self.has_valid_extension(path) && !self.is_ignored(path)
    }

    fn has_valid_extension(&self, path: &Path) -> bool {
        match &self.extensions {
            None => true,
            Some(exts) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext))),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        if normalized.contains("/.git/") {
            return true;
        }
        self.ignore.iter().any(|p| p.matches(&normalized))
    }
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|bin_ext| bin_ext.eq_ignore_ascii_case(ext))
        })
}
