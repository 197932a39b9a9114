//! Error types for wordtally.
//!
//! Every fallible operation in the crate returns [`TallyResult`]. Errors fall
//! into three groups:
//!
//! 1. **Fail-fast errors** detected before any work is scheduled:
//!    [`TallyError::NoInputProvided`], [`TallyError::InvalidConfiguration`]
//!    and [`TallyError::ConfigError`].
//! 2. **Read failures** on a single source: [`TallyError::SourceNotFound`] and
//!    [`TallyError::SourceReadFailure`]. Depending on the configured
//!    [`ReadFailurePolicy`](crate::config::ReadFailurePolicy) these either
//!    abort the run or are recorded as skipped sources.
//! 3. **Run failures**: [`TallyError::Timeout`] and
//!    [`TallyError::WorkerPanicked`], which always abort the run.
//!
//! ```rust,ignore
//! match tally(&config) {
//!     Ok(report) => // Render report,
//!     Err(TallyError::SourceNotFound(path)) => // Handle missing file,
//!     Err(e) => // Handle other errors
//! }
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result type for tally operations
pub type TallyResult<T> = Result<T, TallyError>;

/// Errors that can occur while counting words
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("No input sources provided")]
    NoInputProvided,
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Failed to read {path}: {reason}")]
    SourceReadFailure { path: PathBuf, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error(
        "Timed out after {}: {merged_units} of {total_units} work units merged, result is partial",
        format_limit(.limit)
    )]
    Timeout {
        limit: Duration,
        merged_units: usize,
        total_units: usize,
    },
    #[error("Worker panicked while processing {0}")]
    WorkerPanicked(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_limit(limit: &Duration) -> String {
    humantime::format_duration(*limit).to_string()
}

impl TallyError {
    pub fn source_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound(path.into())
    }

    pub fn read_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceReadFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classifies an I/O error raised while reading `path`.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::source_not_found(path),
            _ => Self::read_failure(path, err.to_string()),
        }
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// A timeout observed by a worker. The engine fills in the unit counts
    /// with [`TallyError::with_progress`] once all workers have joined.
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            limit,
            merged_units: 0,
            total_units: 0,
        }
    }

    pub fn worker_panicked(path: impl Into<PathBuf>) -> Self {
        Self::WorkerPanicked(path.into())
    }

    /// Attaches run progress to a timeout; other errors pass through.
    pub fn with_progress(self, merged_units: usize, total_units: usize) -> Self {
        match self {
            Self::Timeout { limit, .. } => Self::Timeout {
                limit,
                merged_units,
                total_units,
            },
            other => other,
        }
    }

    /// Whether this error is a per-source read failure that the skip policy
    /// may absorb.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::SourceReadFailure { .. }
        )
    }

    /// The source this error is attributed to, if any.
    pub fn source_path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound(path)
            | Self::SourceReadFailure { path, .. }
            | Self::WorkerPanicked(path) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let path = Path::new("notes.txt");
        let err = TallyError::source_not_found(path);
        assert!(matches!(err, TallyError::SourceNotFound(_)));

        let err = TallyError::read_failure(path, "disk on fire");
        assert!(matches!(err, TallyError::SourceReadFailure { .. }));

        let err = TallyError::invalid_configuration("top_n must be positive");
        assert!(matches!(err, TallyError::InvalidConfiguration(_)));

        let err = TallyError::worker_panicked(path);
        assert!(matches!(err, TallyError::WorkerPanicked(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TallyError::NoInputProvided.to_string(),
            "No input sources provided"
        );
        assert_eq!(
            TallyError::source_not_found("missing.txt").to_string(),
            "Source not found: missing.txt"
        );
        assert_eq!(
            TallyError::read_failure("a.txt", "permission denied").to_string(),
            "Failed to read a.txt: permission denied"
        );
        assert_eq!(
            TallyError::invalid_configuration("chunk_size must be positive").to_string(),
            "Invalid configuration: chunk_size must be positive"
        );
        assert_eq!(
            TallyError::timeout(Duration::from_secs(2))
                .with_progress(3, 7)
                .to_string(),
            "Timed out after 2s: 3 of 7 work units merged, result is partial"
        );
    }

    #[test]
    fn test_from_io_classification() {
        let path = Path::new("gone.txt");
        let err = TallyError::from_io(path, io::Error::new(io::ErrorKind::NotFound, "nope"));
        assert!(matches!(err, TallyError::SourceNotFound(ref p) if p == path));

        let err = TallyError::from_io(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, TallyError::SourceReadFailure { .. }));
        assert!(err.is_read_failure());
        assert_eq!(err.source_path(), Some(path));
    }

    #[test]
    fn test_with_progress_leaves_other_errors() {
        let err = TallyError::NoInputProvided.with_progress(1, 2);
        assert!(matches!(err, TallyError::NoInputProvided));
        assert!(!err.is_read_failure());
        assert_eq!(err.source_path(), None);
    }
}
