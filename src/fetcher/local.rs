//! Local directory log source
//!
//! Serves append-only log files from a directory. The cursor is the byte
//! offset just past the last complete line consumed, encoded as a decimal
//! string, so the default cursor `"0"` means "from the beginning" and each
//! chunk seeks straight to where the previous one stopped. A trailing line
//! without its newline is still being written and is left for a later chunk.

use super::{LogSource, SourceError, SourceResult};
use crate::{LogChunk, LogFileCandidate};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, warn};

/// Log source over the regular files of one local directory
#[derive(Debug, Clone)]
pub struct DirectoryLogSource {
    root: PathBuf,
}

impl DirectoryLogSource {
    /// Create a source serving files from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the served directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file_name: &str) -> SourceResult<PathBuf> {
        let plain = Path::new(file_name)
            .file_name()
            .is_some_and(|n| n == file_name);
        if !plain {
            return Err(SourceError::Rejected(format!(
                "'{file_name}' is not a plain file name"
            )));
        }
        Ok(self.root.join(file_name))
    }
}

/// Decode one line, replacing invalid UTF-8 with U+FFFD
fn decode_line(file_name: &str, byte_offset: u64, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            warn!(
                file_name,
                byte_offset,
                "Line is not valid UTF-8; invalid bytes replaced"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

fn system_time_millis(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
}

#[async_trait]
impl LogSource for DirectoryLogSource {
    async fn list_log_files(&self, filter: &str, since: i64) -> SourceResult<Vec<LogFileCandidate>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            SourceError::Unavailable(format!("cannot read {}: {e}", self.root.display()))
        })?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.contains(filter) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    // Removed between listing and stat
                    debug!(file_name = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let last_written = metadata
                .modified()
                .ok()
                .and_then(system_time_millis)
                .unwrap_or_default();
            if last_written < since {
                continue;
            }
            candidates.push(LogFileCandidate {
                name,
                last_written,
                size: metadata.len(),
            });
        }

        candidates.sort_by(|a, b| {
            a.last_written
                .cmp(&b.last_written)
                .then_with(|| a.name.cmp(&b.name))
        });

        debug!(
            root = %self.root.display(),
            filter,
            since,
            count = candidates.len(),
            "Listed log files"
        );
        Ok(candidates)
    }

    async fn download_chunk(
        &self,
        file_name: &str,
        cursor: &str,
        max_lines: u32,
    ) -> SourceResult<LogChunk> {
        let offset: u64 = cursor
            .parse()
            .map_err(|_| SourceError::Rejected(format!("invalid cursor '{cursor}'")))?;
        let path = self.resolve(file_name)?;

        let read_error =
            |e: std::io::Error| SourceError::Unavailable(format!("cannot read {}: {e}", path.display()));

        let mut file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(file_name.to_string()),
            _ => SourceError::Unavailable(format!("cannot open {}: {e}", path.display())),
        })?;
        let file_size = file.metadata().await.map_err(read_error)?.len();
        if offset > file_size {
            warn!(
                file_name,
                cursor,
                file_size,
                "Cursor is past the end of the file; file was truncated or replaced"
            );
            return Ok(LogChunk {
                lines: Vec::new(),
                marker: offset.to_string(),
                more_pending: false,
            });
        }
        file.seek(SeekFrom::Start(offset)).await.map_err(read_error)?;
        let mut reader = BufReader::new(file);

        let max_lines = max_lines.max(1) as usize;
        let mut lines = Vec::new();
        let mut more_pending = false;
        let mut consumed: u64 = 0;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await.map_err(read_error)?;
            if read == 0 || !buf.ends_with(b"\n") {
                break;
            }
            if lines.len() == max_lines {
                more_pending = true;
                break;
            }
            lines.push(decode_line(file_name, offset + consumed, std::mem::take(&mut buf)));
            consumed += read as u64;
        }

        Ok(LogChunk {
            lines,
            marker: (offset + consumed).to_string(),
            more_pending,
        })
    }
}
