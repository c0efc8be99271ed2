/// Error types for forkscout.
///
/// Every fallible operation returns [`SearchResult`]. Failures raised inside a
/// forked leaf are captured on the task handle and surface again at the
/// matching `join`, so the caller of a search sees either a complete report
/// or one error, never both:
///
/// ```rust,ignore
/// match searcher.search(&documents, &patterns) {
///     Ok(report) => println!("{}", report),
///     Err(SearchError::TaskExecution { context, source }) => {
///         eprintln!("leaf failed in {}: {}", context, source)
///     }
///     Err(e) => eprintln!("search failed: {}", e),
/// }
/// ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Task failed while searching {context}: {source}")]
    TaskExecution {
        context: String,
        #[source]
        source: Box<SearchError>,
    },
    #[error("Task panicked: {0}")]
    TaskPanicked(String),
    #[error("Scheduler cannot accept work: {0}")]
    SchedulerExhausted(String),
    #[error("Task handle was already joined")]
    AlreadyJoined,
    #[error("Failed to build worker pool: {0}")]
    PoolBuild(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    /// Wraps a leaf failure with the document/pattern it came from.
    /// Already wrapped errors pass through untouched so nested tasks
    /// do not stack contexts.
    pub fn task_execution(context: impl Into<String>, source: SearchError) -> Self {
        match source {
            already @ Self::TaskExecution { .. } => already,
            already @ Self::TaskPanicked(_) => already,
            other => Self::TaskExecution {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn task_panicked(msg: impl Into<String>) -> Self {
        Self::TaskPanicked(msg.into())
    }

    pub fn scheduler_exhausted(msg: impl Into<String>) -> Self {
        Self::SchedulerExhausted(msg.into())
    }

    pub fn pool_build(msg: impl Into<String>) -> Self {
        Self::PoolBuild(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::str::Utf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O failure on `path` to the most specific variant.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for failures raised by a leaf computation or a forked job.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::TaskExecution { .. } | Self::TaskPanicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let path = Path::new("test.txt");
        let err = SearchError::file_not_found(path);
        assert!(matches!(err, SearchError::FileNotFound(_)));

        let err = SearchError::permission_denied(path);
        assert!(matches!(err, SearchError::PermissionDenied(_)));

        let err = SearchError::invalid_pattern("(unclosed");
        assert!(matches!(err, SearchError::InvalidPattern(_)));

        let err = SearchError::scheduler_exhausted("pool shut down");
        assert!(matches!(err, SearchError::SchedulerExhausted(_)));

        let err = SearchError::task_panicked("boom");
        assert!(err.is_task_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = SearchError::task_execution("\"mi\" in T2", SearchError::invalid_pattern("mi"));
        assert_eq!(
            err.to_string(),
            "Task failed while searching \"mi\" in T2: Invalid pattern: mi"
        );

        let err = SearchError::config_error("Missing required field".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field"
        );

        assert_eq!(
            SearchError::AlreadyJoined.to_string(),
            "Task handle was already joined"
        );

        let err = SearchError::file_not_found("test.txt");
        assert_eq!(err.to_string(), "File not found: test.txt");
    }

    #[test]
    fn test_task_execution_does_not_nest() {
        let inner = SearchError::task_execution("inner", SearchError::invalid_pattern("x"));
        let outer = SearchError::task_execution("outer", inner);
        match outer {
            SearchError::TaskExecution { context, .. } => assert_eq!(context, "inner"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_io_maps_kind() {
        let path = Path::new("missing.txt");
        let err = SearchError::from_io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, SearchError::FileNotFound(_)));

        let err = SearchError::from_io(
            path,
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        );
        assert!(matches!(err, SearchError::IoError(_)));
    }
}
