//! Checkpoint state: global watermark plus per-file cursors

use crate::identifier::FileKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cursor assumed for files never seen before
pub const DEFAULT_CURSOR: &str = "0";

/// Durable harvest progress
///
/// The watermark bounds the next listing query; cursors record how far each
/// file has been read. Cursors are opaque tokens handed out by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    watermark: i64,
    cursors: BTreeMap<String, String>,
}

impl Checkpoint {
    /// Create a checkpoint with the given watermark and no cursors
    pub fn new(watermark: i64) -> Self {
        Self {
            watermark,
            cursors: BTreeMap::new(),
        }
    }

    /// Create a checkpoint from a watermark and an existing cursor map
    pub fn with_cursors(watermark: i64, cursors: BTreeMap<String, String>) -> Self {
        Self { watermark, cursors }
    }

    /// Checkpoint for a source that has never been harvested: start at `now`
    pub fn fresh() -> Self {
        Self::new(chrono::Utc::now().timestamp_millis())
    }

    /// Get the watermark (Unix milliseconds)
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Raise the watermark. Lower values are ignored.
    pub fn advance_watermark(&mut self, watermark: i64) {
        if watermark > self.watermark {
            self.watermark = watermark;
        }
    }

    /// Get the cursor for a file, or [`DEFAULT_CURSOR`] if it has none
    pub fn cursor(&self, key: &FileKey) -> &str {
        self.cursors
            .get(key.as_str())
            .map(String::as_str)
            .unwrap_or(DEFAULT_CURSOR)
    }

    /// Record the cursor reached for a file
    pub fn set_cursor(&mut self, key: &FileKey, cursor: impl Into<String>) {
        self.cursors.insert(key.as_str().to_string(), cursor.into());
    }

    /// Get all cursors keyed by file identity
    pub fn cursors(&self) -> &BTreeMap<String, String> {
        &self.cursors
    }
}
