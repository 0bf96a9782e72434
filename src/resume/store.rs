//! Durable checkpoint store
//!
//! The checkpoint file is two lines of text: the watermark as a decimal
//! integer, then the cursor map as a flat JSON object. Writes go through a
//! temp file and an atomic rename so a crash leaves either the previous or
//! the new checkpoint, never a mix of the two.

use super::checkpoint::Checkpoint;
use fd_lock::RwLock;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum accepted checkpoint file size (10 MB); larger files are treated as corrupt
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Load the checkpoint, falling back to defaults on absence or corruption
    ///
    /// - missing or empty file: watermark = now, no cursors
    /// - unreadable file or watermark line: watermark = 0, no cursors
    /// - valid watermark but malformed cursor line: that watermark, no cursors
    ///
    /// Never fails; every fallback is logged.
    pub fn load(&self) -> Checkpoint {
        debug!(path = %self.path.display(), "Loading checkpoint");

        match self.path.try_exists() {
            Ok(true) => {}
            Ok(false) => {
                info!(path = %self.path.display(), "No checkpoint found, starting from now");
                return Checkpoint::fresh();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Checkpoint unreadable, restarting from watermark 0");
                return Checkpoint::new(0);
            }
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path());
        let lock = match lock_file {
            Ok(file) => Some(RwLock::new(file)),
            Err(e) => {
                warn!(error = %e, "Failed to open checkpoint lock file, reading unlocked");
                None
            }
        };
        let _guard = match lock.as_ref().map(|l| l.read()) {
            Some(Ok(guard)) => Some(guard),
            Some(Err(e)) => {
                warn!(error = %e, "Failed to acquire checkpoint read lock, reading unlocked");
                None
            }
            None => None,
        };

        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Checkpoint unreadable, restarting from watermark 0");
                return Checkpoint::new(0);
            }
        };
        if size > MAX_CHECKPOINT_FILE_SIZE {
            warn!(
                path = %self.path.display(),
                size,
                max = MAX_CHECKPOINT_FILE_SIZE,
                "Checkpoint file too large, restarting from watermark 0"
            );
            return Checkpoint::new(0);
        }

        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let checkpoint = parse_checkpoint(&contents);
                info!(
                    path = %self.path.display(),
                    watermark = checkpoint.watermark(),
                    cursors = checkpoint.cursors().len(),
                    "Checkpoint loaded"
                );
                checkpoint
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Checkpoint unreadable, restarting from watermark 0");
                Checkpoint::new(0)
            }
        }
    }

    /// Atomically replace the stored checkpoint
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the medium cannot be written. Callers must
    /// not ignore it: a lost save means silent reprocessing after restart.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        debug!(
            path = %self.path.display(),
            watermark = checkpoint.watermark(),
            cursors = checkpoint.cursors().len(),
            "Saving checkpoint"
        );

        let parent_dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent_dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let contents = render_checkpoint(checkpoint)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| StoreError::Lock(format!("Failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {e}")))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| StoreError::Io(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| StoreError::Io(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| StoreError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::Io(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to persist temp file: {e}")))?;

        // Make the rename itself durable
        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        debug!(path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Delete the checkpoint and its lock file
    ///
    /// Only used by explicit operator reset; normal operation never deletes state.
    pub fn remove(&self) -> Result<bool, StoreError> {
        let existed = self.path.exists();
        if existed {
            std::fs::remove_file(&self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let lock_path = self.lock_path();
        if lock_path.exists() {
            std::fs::remove_file(&lock_path).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(existed)
    }
}

/// Parse checkpoint file contents, applying per-field fallbacks
pub(crate) fn parse_checkpoint(contents: &str) -> Checkpoint {
    if contents.trim().is_empty() {
        info!("Checkpoint file is empty, starting from now");
        return Checkpoint::fresh();
    }

    let mut lines = contents.lines();
    let watermark_line = lines.next().unwrap_or_default().trim();
    let watermark = match watermark_line.parse::<i64>() {
        Ok(w) => w,
        Err(e) => {
            warn!(
                line = %watermark_line,
                error = %e,
                "Checkpoint watermark is corrupt, restarting from watermark 0"
            );
            return Checkpoint::new(0);
        }
    };

    let cursors_line = lines.next().unwrap_or_default().trim();
    if cursors_line.is_empty() {
        return Checkpoint::new(watermark);
    }

    match serde_json::from_str::<BTreeMap<String, String>>(cursors_line) {
        Ok(cursors) => Checkpoint::with_cursors(watermark, cursors),
        Err(e) => {
            warn!(
                watermark,
                error = %e,
                "Checkpoint cursors are corrupt, keeping watermark and dropping cursors"
            );
            Checkpoint::new(watermark)
        }
    }
}

fn render_checkpoint(checkpoint: &Checkpoint) -> Result<String, StoreError> {
    let cursors = serde_json::to_string(checkpoint.cursors())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(format!("{}\n{}\n", checkpoint.watermark(), cursors))
}

/// Errors related to checkpoint persistence
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}
