//! Log source adapters

use crate::{LogChunk, LogFileCandidate};
use async_trait::async_trait;

pub mod local;

pub use local::DirectoryLogSource;

/// Log source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Source service unreachable or failing
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Source rejected the request (bad marker, throttling, ...)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Named log file no longer exists
    #[error("log file not found: {0}")]
    NotFound(String),

    /// Source is misconfigured and cannot recover by retrying
    #[error("source configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Whether the next scheduled cycle may succeed by retrying from the same state
    pub fn is_transient(&self) -> bool {
        !matches!(self, SourceError::Configuration(_))
    }
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Remote log source capability
///
/// Cursors are opaque to the harvester: they are produced by
/// [`LogSource::download_chunk`] and handed back verbatim on the next call.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// List log files whose name contains `filter` and whose last-modified
    /// time (Unix milliseconds) is at or after `since`
    async fn list_log_files(&self, filter: &str, since: i64) -> SourceResult<Vec<LogFileCandidate>>;

    /// Fetch at most `max_lines` lines of `file_name` starting at `cursor`
    async fn download_chunk(
        &self,
        file_name: &str,
        cursor: &str,
        max_lines: u32,
    ) -> SourceResult<LogChunk>;
}
