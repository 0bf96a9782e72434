//! One polling cycle: list, drain, advance, commit

use super::{HarvestError, HarvesterConfig};
use crate::fetcher::LogSource;
use crate::identifier::FileKey;
use crate::metrics::{CycleMetrics, CycleOutcomeLabel};
use crate::output::{EventSink, LineCodec};
use crate::resume::{Checkpoint, CheckpointStore};
use crate::{Event, LogFileCandidate};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Maximum chunks drained from one file in one cycle.
/// Bounds a source that keeps reporting pending data; the remainder is
/// picked up on the next tick.
pub const MAX_CHUNKS_PER_FILE: usize = 10_000;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every candidate was drained or skipped
    Completed,
    /// A transient source error cut the cycle short; progress was committed
    Aborted {
        /// Error description
        reason: String,
    },
}

/// Summary of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// How the cycle ended
    pub outcome: CycleOutcome,
    /// Candidates returned by the listing
    pub files_listed: usize,
    /// Candidates read to the end
    pub files_drained: usize,
    /// Candidates skipped for lack of an identity key
    pub files_skipped: usize,
    /// Chunks fetched
    pub chunks_fetched: usize,
    /// Events handed to the sink
    pub lines_emitted: u64,
    /// Watermark at cycle start
    pub watermark_before: i64,
    /// Watermark committed at cycle end
    pub watermark_after: i64,
}

impl CycleReport {
    fn new(watermark: i64) -> Self {
        Self {
            outcome: CycleOutcome::Completed,
            files_listed: 0,
            files_drained: 0,
            files_skipped: 0,
            chunks_fetched: 0,
            lines_emitted: 0,
            watermark_before: watermark,
            watermark_after: watermark,
        }
    }
}

/// In-memory progress of a running cycle
struct CycleProgress {
    report: CycleReport,
    new_watermark: i64,
    /// Oldest modification time among candidates left with pending data
    held_back: Option<i64>,
}

impl CycleProgress {
    fn hold_back(&mut self, last_written: i64) {
        self.held_back = Some(match self.held_back {
            Some(current) => current.min(last_written),
            None => last_written,
        });
    }

    /// Watermark that keeps every candidate with pending data listable
    fn committable_watermark(&self) -> i64 {
        match self.held_back {
            Some(floor) => self.new_watermark.min(floor),
            None => self.new_watermark,
        }
    }
}

enum FileDrain {
    Complete,
    ChunkLimitReached,
}

/// Drives polling cycles against one log source
pub struct FetchCycleEngine {
    config: HarvesterConfig,
    source: Arc<dyn LogSource>,
    codec: Arc<dyn LineCodec>,
    sink: Arc<dyn EventSink>,
    store: CheckpointStore,
}

impl FetchCycleEngine {
    /// Create an engine
    pub fn new(
        config: HarvesterConfig,
        source: Arc<dyn LogSource>,
        codec: Arc<dyn LineCodec>,
        sink: Arc<dyn EventSink>,
        store: CheckpointStore,
    ) -> Self {
        Self {
            config,
            source,
            codec,
            sink,
            store,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &HarvesterConfig {
        &self.config
    }

    /// Get the checkpoint store
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Load the checkpoint this engine resumes from
    pub fn load_checkpoint(&self) -> Checkpoint {
        self.store.load()
    }

    /// Run one cycle against `checkpoint` and commit it
    ///
    /// The checkpoint is saved before returning in every outcome. Transient
    /// source errors yield `Ok` with [`CycleOutcome::Aborted`]; other errors
    /// are returned after the commit.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Store`] if the commit fails, otherwise the
    /// non-transient error that ended the cycle.
    pub async fn run_cycle(&self, checkpoint: &mut Checkpoint) -> Result<CycleReport, HarvestError> {
        let span = info_span!(
            "harvest_cycle",
            source_instance = %self.config.source_instance,
            log_file = %self.config.log_file_filter,
            watermark = checkpoint.watermark()
        );
        self.run_cycle_inner(checkpoint).instrument(span).await
    }

    async fn run_cycle_inner(
        &self,
        checkpoint: &mut Checkpoint,
    ) -> Result<CycleReport, HarvestError> {
        let metrics = CycleMetrics::start(&self.config.source_instance);
        let original_watermark = checkpoint.watermark();
        let mut progress = CycleProgress {
            report: CycleReport::new(original_watermark),
            new_watermark: original_watermark,
            held_back: None,
        };

        debug!(
            cursors = checkpoint.cursors().len(),
            "Starting harvest cycle"
        );

        let drained = self.drain_all(checkpoint, &mut progress, &metrics).await;

        let result = match drained {
            Ok(()) => {
                checkpoint.advance_watermark(progress.committable_watermark());
                Ok(())
            }
            Err(HarvestError::Source(e)) if e.is_transient() => {
                warn!(
                    error = %e,
                    watermark = original_watermark,
                    "Transient source error; committing progress and retrying next cycle"
                );
                metrics.record_transient_error();
                checkpoint.advance_watermark(progress.committable_watermark());
                progress.report.outcome = CycleOutcome::Aborted {
                    reason: e.to_string(),
                };
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Harvest cycle failed; committing progress");
                checkpoint.advance_watermark(progress.committable_watermark());
                Err(e)
            }
        };

        // Commit regardless of outcome
        let saved = self.store.save(checkpoint);
        metrics.record_checkpoint_save(saved.is_ok(), checkpoint.watermark());
        if let Err(e) = saved {
            error!(
                path = %self.store.path().display(),
                watermark = checkpoint.watermark(),
                error = %e,
                "Failed to commit checkpoint"
            );
            if let Err(cycle_error) = &result {
                warn!(error = %cycle_error, "Cycle error superseded by checkpoint failure");
            }
            metrics.finish(CycleOutcomeLabel::Failed);
            return Err(HarvestError::Store(e));
        }

        if let Err(e) = result {
            metrics.finish(CycleOutcomeLabel::Failed);
            return Err(e);
        }

        progress.report.watermark_after = checkpoint.watermark();
        let report = progress.report;
        let label = match report.outcome {
            CycleOutcome::Completed => CycleOutcomeLabel::Completed,
            CycleOutcome::Aborted { .. } => CycleOutcomeLabel::Aborted,
        };
        metrics.finish(label);

        info!(
            files_listed = report.files_listed,
            files_drained = report.files_drained,
            files_skipped = report.files_skipped,
            lines_emitted = report.lines_emitted,
            watermark_before = report.watermark_before,
            watermark_after = report.watermark_after,
            outcome = ?report.outcome,
            "Harvest cycle finished"
        );
        Ok(report)
    }

    async fn drain_all(
        &self,
        checkpoint: &mut Checkpoint,
        progress: &mut CycleProgress,
        metrics: &CycleMetrics,
    ) -> Result<(), HarvestError> {
        let since = progress.report.watermark_before;
        let candidates = self
            .source
            .list_log_files(&self.config.log_file_filter, since)
            .await?;
        progress.report.files_listed = candidates.len();

        debug!(count = candidates.len(), since, "Listed candidate files");

        for (index, candidate) in candidates.iter().enumerate() {
            match self
                .drain_candidate(checkpoint, candidate, progress, metrics)
                .await
            {
                Ok(FileDrain::Complete) => progress.report.files_drained += 1,
                Ok(FileDrain::ChunkLimitReached) => {
                    warn!(
                        file_name = %candidate.name,
                        max_chunks = MAX_CHUNKS_PER_FILE,
                        "Chunk limit reached; remaining data is left for the next cycle"
                    );
                    progress.hold_back(candidate.last_written);
                }
                Err(HarvestError::KeyDerivation(e)) => {
                    error!(
                        file_name = %candidate.name,
                        error = %e,
                        "Cannot derive file key; skipping file"
                    );
                    metrics.record_skipped_file();
                    progress.report.files_skipped += 1;
                }
                Err(e) => {
                    for pending in &candidates[index..] {
                        if FileKey::derive(&pending.name).is_ok() {
                            progress.hold_back(pending.last_written);
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn drain_candidate(
        &self,
        checkpoint: &mut Checkpoint,
        candidate: &LogFileCandidate,
        progress: &mut CycleProgress,
        metrics: &CycleMetrics,
    ) -> Result<FileDrain, HarvestError> {
        let key = FileKey::derive(&candidate.name)?;

        debug!(file_name = %candidate.name, key = %key, "Downloading log file");

        for _ in 0..MAX_CHUNKS_PER_FILE {
            let cursor = checkpoint.cursor(&key).to_string();
            let chunk = self
                .source
                .download_chunk(&candidate.name, &cursor, self.config.max_lines_per_request)
                .await
                .map_err(|e| {
                    warn!(
                        file_name = %candidate.name,
                        cursor = %cursor,
                        watermark = progress.report.watermark_before,
                        error = %e,
                        "Chunk download failed"
                    );
                    e
                })?;

            // A file counts toward the watermark once the source has served it
            if candidate.last_written > progress.new_watermark {
                progress.new_watermark = candidate.last_written;
            }

            for line in &chunk.lines {
                let event = self.build_event(&candidate.name, line);
                self.sink.send(event).await?;
            }
            if !chunk.lines.is_empty() {
                self.sink.flush().await?;
            }

            debug!(
                file_name = %candidate.name,
                cursor = %cursor,
                marker = %chunk.marker,
                lines = chunk.lines.len(),
                more_pending = chunk.more_pending,
                "Chunk forwarded"
            );

            // Lines are handed off; only now may the cursor move
            checkpoint.set_cursor(&key, chunk.marker);
            metrics.record_chunk(chunk.lines.len());
            progress.report.chunks_fetched += 1;
            progress.report.lines_emitted += chunk.lines.len() as u64;

            if !chunk.more_pending {
                return Ok(FileDrain::Complete);
            }
        }

        Ok(FileDrain::ChunkLimitReached)
    }

    fn build_event(&self, file_name: &str, line: &str) -> Event {
        let decoded = self.codec.decode(line);
        let mut fields = decoded.fields;
        for (key, value) in &self.config.add_fields {
            fields.insert(key.clone(), Value::String(value.clone()));
        }
        let mut tags = decoded.tags;
        tags.extend(self.config.tags.iter().cloned());

        Event {
            timestamp: chrono::Utc::now(),
            message: decoded.message,
            source_instance: self.config.source_instance.clone(),
            log_file: self.config.log_file_filter.clone(),
            file_name: file_name.to_string(),
            fields,
            tags,
        }
    }
}
