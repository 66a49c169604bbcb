//! One input's trip through staging, probing and transcoding

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;

use super::engine::{ReturnCode, TranscodeEngine};
use super::invoker;
use super::staging::{self, ContentSource, InputHandle, StagedInput};
use crate::core::ProgressBoard;

/// Extracts a playback duration in milliseconds, 0 when unknown
pub type DurationProbe = fn(&Path) -> u64;

/// Why a single job failed
///
/// Contained at the job boundary; the batch only sees success or failure.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("cannot read input {input}: {source}")]
    ResourceUnreadable {
        input: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to stage input: {0}")]
    Staging(#[source] io::Error),

    #[error("transcoding engine reported failure (exit code {code:?})")]
    EngineFailure { code: Option<i32> },

    #[error("transcoding engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("engine reported success but {} was not written", path.display())]
    OutputMissing { path: PathBuf },

    #[error("failed to publish {}: {source}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("conversion task aborted: {0}")]
    Aborted(String),
}

/// One input plus where its output should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: InputHandle,
    pub destination_dir: PathBuf,
}

impl ConversionRequest {
    pub fn new(input: InputHandle, destination_dir: &Path) -> Self {
        Self {
            input,
            destination_dir: destination_dir.to_path_buf(),
        }
    }
}

/// Terminal state of a job
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(PathBuf),
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Collaborators shared by every job of a batch
#[derive(Clone)]
pub(crate) struct JobContext {
    pub source: Arc<dyn ContentSource>,
    pub engine: Arc<dyn TranscodeEngine>,
    pub probe: DurationProbe,
    pub transcode_slots: Arc<Semaphore>,
    pub progress: ProgressBoard,
}

/// Runtime state for one request
#[derive(Debug)]
pub struct ConversionJob {
    /// Position in the submitted batch; also the progress slot
    pub index: usize,
    pub request: ConversionRequest,
    /// Candidate output, only handed on if the job succeeds
    pub output_path: PathBuf,
    /// 0 means unknown
    pub duration_hint_ms: u64,
    staged: Option<StagedInput>,
}

impl ConversionJob {
    pub fn new(index: usize, request: ConversionRequest, output_path: PathBuf) -> Self {
        Self {
            index,
            request,
            output_path,
            duration_hint_ms: 0,
            staged: None,
        }
    }

    /// Staged copy of the input, while the job is running
    pub fn staged_path(&self) -> Option<&Path> {
        self.staged.as_ref().map(StagedInput::path)
    }

    /// Run to a terminal state
    ///
    /// The staged input is removed on every path out of here, and a failed
    /// job leaves no candidate output behind.
    pub(crate) async fn run(mut self, ctx: &JobContext) -> JobOutcome {
        log::info!("Job {}: converting {}", self.index, self.request.input);

        let result = self.execute(ctx).await;
        self.staged = None;

        match result {
            Ok(output) => JobOutcome::Succeeded(output),
            Err(e) => {
                log::error!("Job {} ({}) failed: {}", self.index, self.request.input, e);
                match tokio::fs::remove_file(&self.output_path).await {
                    Ok(()) => log::debug!("Removed partial output {:?}", self.output_path),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => log::warn!(
                        "Failed to remove partial output {:?}: {}",
                        self.output_path,
                        e
                    ),
                }
                JobOutcome::Failed(e)
            }
        }
    }

    async fn execute(&mut self, ctx: &JobContext) -> Result<PathBuf, JobError> {
        let staged = staging::stage(
            ctx.source.as_ref(),
            &self.request.input,
            &self.request.destination_dir,
        )
        .await?;
        let staged_path = staged.path().to_path_buf();
        self.staged = Some(staged);

        let probe = ctx.probe;
        let probe_path = staged_path.clone();
        self.duration_hint_ms = tokio::task::spawn_blocking(move || probe(&probe_path))
            .await
            .unwrap_or(0);
        if self.duration_hint_ms == 0 {
            log::debug!(
                "Job {}: duration unknown, progress will jump to 100 on completion",
                self.index
            );
        }

        let _permit = ctx
            .transcode_slots
            .acquire()
            .await
            .map_err(|_| JobError::EngineUnavailable("transcode pool closed".to_string()))?;

        let progress = ctx.progress.clone();
        let index = self.index;
        let code = invoker::invoke(
            ctx.engine.as_ref(),
            &staged_path,
            &self.output_path,
            self.duration_hint_ms,
            move |percent| progress.update(index, percent),
        )
        .await;

        match code {
            ReturnCode::Success => {}
            ReturnCode::Error(code) => return Err(JobError::EngineFailure { code }),
            ReturnCode::Unavailable(reason) => return Err(JobError::EngineUnavailable(reason)),
        }

        if !tokio::fs::try_exists(&self.output_path).await.unwrap_or(false) {
            return Err(JobError::OutputMissing {
                path: self.output_path.clone(),
            });
        }

        ctx.progress.update(self.index, 100.0);
        Ok(self.output_path.clone())
    }
}
