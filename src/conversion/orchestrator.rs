//! Concurrent batch conversion
//!
//! Every input gets its own task. The batch waits for all of them, never
//! cancelling siblings when one fails, then publishes only if every job
//! produced a file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;

use super::engine::TranscodeEngine;
use super::ffmpeg::FfmpegEngine;
use super::job::{
    ConversionJob, ConversionRequest, DurationProbe, JobContext, JobError, JobOutcome,
};
use super::library::{FolderLibrary, LibraryEntry, MP3_MIME_TYPE, MediaLibrary};
use super::staging::{ContentSource, FileContentSource, InputHandle};
use crate::core::{ConverterConfig, ProgressBoard, default_parallel_transcodes};
use crate::media::probe_duration_ms;

/// Aggregate result of one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// True only when every job produced a file and every file was published
    pub success: bool,
    /// Produced files, in batch order; deleted from the work directory
    /// once the whole batch has been published
    pub produced: Vec<PathBuf>,
    /// Library entries, empty unless the whole batch succeeded
    pub published: Vec<LibraryEntry>,
    /// Per-job failures (batch index, reason); for logs only
    pub failures: Vec<(usize, JobError)>,
}

/// Running tally for log lines
#[derive(Debug)]
struct BatchTally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    total: usize,
}

impl BatchTally {
    fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total,
        }
    }

    fn record(&self, outcome: &JobOutcome) -> usize {
        let counter = if outcome.is_success() {
            &self.completed
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.finished()
    }

    fn finished(&self) -> usize {
        self.completed.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }
}

/// Output path for the job at `index` of a batch started at `batch_ms`
pub fn output_path_for(destination_dir: &Path, batch_ms: i64, index: usize) -> PathBuf {
    destination_dir.join(format!("converted_audio_{}.mp3", batch_ms + index as i64))
}

/// Drop the work-directory copies of files the library now holds
async fn remove_work_copies(files: &[PathBuf]) {
    for file in files {
        match tokio::fs::remove_file(file).await {
            Ok(()) => log::debug!("Removed work copy {:?}", file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove work copy {:?}: {}", file, e),
        }
    }
}

/// Runs batches of conversions against a set of collaborators
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn TranscodeEngine>,
    source: Arc<dyn ContentSource>,
    library: Arc<dyn MediaLibrary>,
    probe: DurationProbe,
    transcode_slots: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn TranscodeEngine>,
        source: Arc<dyn ContentSource>,
        library: Arc<dyn MediaLibrary>,
    ) -> Self {
        Self {
            engine,
            source,
            library,
            probe: probe_duration_ms,
            transcode_slots: Arc::new(Semaphore::new(default_parallel_transcodes())),
        }
    }

    /// Default collaborators: ffmpeg, local files, a folder library
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            Arc::new(FfmpegEngine::new(&config.ffmpeg_path)),
            Arc::new(FileContentSource),
            Arc::new(FolderLibrary::new(&config.library_dir)),
        )
        .with_max_parallel_transcodes(config.max_parallel_transcodes)
    }

    /// Bound how many engine runs may be in flight at once (minimum 1)
    pub fn with_max_parallel_transcodes(mut self, max: usize) -> Self {
        self.transcode_slots = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn with_duration_probe(mut self, probe: DurationProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Convert every input concurrently and wait for all of them
    ///
    /// `progress` must already hold one slot per input. An empty batch
    /// launches nothing and is reported as a failure.
    pub async fn run_batch(
        &self,
        inputs: &[InputHandle],
        destination_dir: &Path,
        progress: &ProgressBoard,
    ) -> BatchOutcome {
        if inputs.is_empty() {
            log::warn!("Conversion requested with no inputs");
            return BatchOutcome::default();
        }

        let batch_ms = chrono::Local::now().timestamp_millis();
        let tally = Arc::new(BatchTally::new(inputs.len()));
        let ctx = JobContext {
            source: self.source.clone(),
            engine: self.engine.clone(),
            probe: self.probe,
            transcode_slots: self.transcode_slots.clone(),
            progress: progress.clone(),
        };

        log::info!(
            "Starting batch: {} files into {:?} with {} transcode slots",
            inputs.len(),
            destination_dir,
            self.transcode_slots.available_permits()
        );

        let handles: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let job = ConversionJob::new(
                    index,
                    ConversionRequest::new(input.clone(), destination_dir),
                    output_path_for(destination_dir, batch_ms, index),
                );
                let ctx = ctx.clone();
                let tally = tally.clone();
                let name = input.to_string();

                tokio::spawn(async move {
                    let outcome = job.run(&ctx).await;
                    let finished = tally.record(&outcome);
                    if outcome.is_success() {
                        log::info!("Completed ({}/{}): {}", finished, tally.total, name);
                    } else {
                        log::info!("Failed ({}/{}): {}", finished, tally.total, name);
                    }
                    outcome
                })
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        let mut produced = Vec::new();
        for (index, result) in join_all(handles).await.into_iter().enumerate() {
            match result {
                Ok(JobOutcome::Succeeded(path)) => produced.push((index, path)),
                Ok(JobOutcome::Failed(e)) => outcome.failures.push((index, e)),
                Err(e) => {
                    log::error!("Job {} task did not finish: {}", index, e);
                    outcome.failures.push((index, JobError::Aborted(e.to_string())));
                }
            }
        }

        if outcome.failures.is_empty() {
            for (index, path) in &produced {
                match self.library.publish(path, MP3_MIME_TYPE).await {
                    Ok(entry) => {
                        log::info!("File saved: {:?} as {}", path, entry.display_name);
                        outcome.published.push(entry);
                    }
                    Err(e) => {
                        log::error!("Failed to publish {:?}: {}", path, e);
                        outcome.failures.push((
                            *index,
                            JobError::Publish {
                                path: path.clone(),
                                source: e,
                            },
                        ));
                    }
                }
            }
        } else {
            log::error!(
                "Conversion failed for {} of {} files; nothing published",
                outcome.failures.len(),
                inputs.len()
            );
        }

        outcome.produced = produced.into_iter().map(|(_, path)| path).collect();
        outcome.success = outcome.failures.is_empty() && outcome.produced.len() == inputs.len();

        if outcome.success {
            remove_work_copies(&outcome.produced).await;
        }

        log::info!(
            "Batch finished: success={} produced={} published={} failed={}",
            outcome.success,
            outcome.produced.len(),
            outcome.published.len(),
            outcome.failures.len()
        );
        outcome
    }
}
