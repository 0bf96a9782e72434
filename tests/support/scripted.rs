//! Scripted log source and recording sink shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use log_harvester::fetcher::{LogSource, SourceError, SourceResult};
use log_harvester::harvester::{FetchCycleEngine, HarvesterConfig};
use log_harvester::output::{EventSink, PlainCodec, SinkError, SinkResult};
use log_harvester::{CheckpointStore, Event, LogChunk, LogFileCandidate};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const INSTANCE: &str = "db-1";
pub const FILTER: &str = "app";

#[derive(Default)]
struct Script {
    files: Vec<LogFileCandidate>,
    /// Explicit chunks keyed by (file, cursor)
    chunks: HashMap<(String, String), LogChunk>,
    /// Line-addressed contents, paged by `max_lines`
    contents: HashMap<String, Vec<String>>,
    download_failures: HashMap<String, VecDeque<SourceError>>,
    cursor_failures: HashMap<(String, String), VecDeque<SourceError>>,
    listing_failures: VecDeque<SourceError>,
    downloads: Vec<(String, String)>,
    listings: Vec<i64>,
}

/// In-memory log source driven by a script
///
/// Files are listed in insertion order. A read at a cursor with no scripted
/// chunk returns an empty chunk that keeps the cursor, like a real source at
/// end of file.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a file, or update its modification time if already present
    pub fn add_file(&self, name: &str, last_written: i64) {
        let mut script = self.script.lock().unwrap();
        let candidate = LogFileCandidate {
            name: name.to_string(),
            last_written,
            size: 0,
        };
        match script.files.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = candidate,
            None => script.files.push(candidate),
        }
    }

    /// Script the chunk returned for `name` at `cursor`
    pub fn add_chunk(&self, name: &str, cursor: &str, lines: &[&str], marker: &str, more: bool) {
        self.script.lock().unwrap().chunks.insert(
            (name.to_string(), cursor.to_string()),
            LogChunk {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                marker: marker.to_string(),
                more_pending: more,
            },
        );
    }

    /// Serve `lines` with line-offset cursors
    pub fn set_contents(&self, name: &str, lines: &[&str]) {
        self.script.lock().unwrap().contents.insert(
            name.to_string(),
            lines.iter().map(|l| format!("{l}\n")).collect(),
        );
    }

    /// Fail the next download of `name`
    pub fn fail_download(&self, name: &str, error: SourceError) {
        self.script
            .lock()
            .unwrap()
            .download_failures
            .entry(name.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail the next download of `name` that starts at `cursor`
    pub fn fail_download_at(&self, name: &str, cursor: &str, error: SourceError) {
        self.script
            .lock()
            .unwrap()
            .cursor_failures
            .entry((name.to_string(), cursor.to_string()))
            .or_default()
            .push_back(error);
    }

    /// Fail the next listing
    pub fn fail_listing(&self, error: SourceError) {
        self.script.lock().unwrap().listing_failures.push_back(error);
    }

    /// Every (file, cursor) requested so far
    pub fn downloads(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().downloads.clone()
    }

    /// The `since` bound of every listing so far
    pub fn listings(&self) -> Vec<i64> {
        self.script.lock().unwrap().listings.clone()
    }
}

#[async_trait]
impl LogSource for ScriptedSource {
    async fn list_log_files(&self, filter: &str, since: i64) -> SourceResult<Vec<LogFileCandidate>> {
        let mut script = self.script.lock().unwrap();
        script.listings.push(since);
        if let Some(error) = script.listing_failures.pop_front() {
            return Err(error);
        }
        Ok(script
            .files
            .iter()
            .filter(|f| f.name.contains(filter) && f.last_written >= since)
            .cloned()
            .collect())
    }

    async fn download_chunk(
        &self,
        file_name: &str,
        cursor: &str,
        max_lines: u32,
    ) -> SourceResult<LogChunk> {
        let mut script = self.script.lock().unwrap();
        script
            .downloads
            .push((file_name.to_string(), cursor.to_string()));

        if let Some(error) = script
            .download_failures
            .get_mut(file_name)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }
        if let Some(error) = script
            .cursor_failures
            .get_mut(&(file_name.to_string(), cursor.to_string()))
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        if let Some(chunk) = script
            .chunks
            .get(&(file_name.to_string(), cursor.to_string()))
        {
            return Ok(chunk.clone());
        }

        if let Some(lines) = script.contents.get(file_name) {
            let offset: usize = cursor
                .parse()
                .map_err(|_| SourceError::Rejected(format!("bad marker {cursor}")))?;
            let end = (offset + max_lines as usize).min(lines.len());
            let start = offset.min(end);
            return Ok(LogChunk {
                lines: lines[start..end].to_vec(),
                marker: end.to_string(),
                more_pending: end < lines.len(),
            });
        }

        Ok(LogChunk {
            lines: Vec::new(),
            marker: cursor.to_string(),
            more_pending: false,
        })
    }
}

/// Sink that records every event and can be closed after N events
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
    close_after: Mutex<Option<usize>>,
    flushes: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Accept `count` more events, then report the sink as closed
    pub fn close_after(&self, count: usize) {
        let delivered = self.events.lock().unwrap().len();
        *self.close_after.lock().unwrap() = Some(delivered + count);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: Event) -> SinkResult<()> {
        let mut events = self.events.lock().unwrap();
        if let Some(limit) = *self.close_after.lock().unwrap() {
            if events.len() >= limit {
                return Err(SinkError::Closed);
            }
        }
        events.push(event);
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn config(store_path: &Path) -> HarvesterConfig {
    HarvesterConfig::new(INSTANCE, FILTER).with_checkpoint_path(store_path)
}

pub fn engine_with_config(
    config: HarvesterConfig,
    source: &Arc<ScriptedSource>,
    sink: &Arc<RecordingSink>,
) -> FetchCycleEngine {
    let store = CheckpointStore::new(config.checkpoint_path());
    FetchCycleEngine::new(
        config,
        source.clone(),
        Arc::new(PlainCodec),
        sink.clone(),
        store,
    )
}

pub fn engine(
    store_path: &Path,
    source: &Arc<ScriptedSource>,
    sink: &Arc<RecordingSink>,
) -> FetchCycleEngine {
    engine_with_config(config(store_path), source, sink)
}
