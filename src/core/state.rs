//! Observable converter state
//!
//! `ConverterState` is the single place the presentation layer talks to:
//! it accepts the `select` / `clear` / `start` commands and publishes
//! read-only snapshots of the aggregate state and per-input progress.
//!
//! Transitions:
//! - idle / selected / finished --select--> selected
//! - idle / selected / finished --clear--> idle
//! - selected --start--> running
//! - running --(batch finished)--> finished (success or failure)
//!
//! Nothing leaves `running` except the batch completing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::progress::{ProgressBoard, ProgressSnapshot};
use crate::conversion::{BatchOutcome, InputHandle, JobError, Orchestrator};

/// Snapshot consumed by the presentation layer
///
/// `conversion_success` is only set once `conversion_in_progress` has gone
/// back to false; both change in the same update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateState {
    /// Identifiers of the currently selected inputs
    pub selected: Vec<String>,
    pub conversion_in_progress: bool,
    /// None until a batch finishes
    pub conversion_success: Option<bool>,
}

/// Where the state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Selected,
    Running,
    Succeeded,
    Failed,
}

impl AggregateState {
    pub fn phase(&self) -> Phase {
        if self.conversion_in_progress {
            return Phase::Running;
        }
        match self.conversion_success {
            Some(true) => Phase::Succeeded,
            Some(false) => Phase::Failed,
            None if self.selected.is_empty() => Phase::Idle,
            None => Phase::Selected,
        }
    }
}

/// Rejected commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a conversion is already running")]
    Busy,

    #[error("no inputs are selected")]
    NothingSelected,
}

struct StateInner {
    state_tx: watch::Sender<AggregateState>,
    progress: ProgressBoard,
    orchestrator: Orchestrator,
    destination_dir: PathBuf,
}

/// Command/observation handle for one converter
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ConverterState {
    inner: Arc<StateInner>,
}

impl ConverterState {
    pub fn new(orchestrator: Orchestrator, destination_dir: impl Into<PathBuf>) -> Self {
        let (state_tx, _rx) = watch::channel(AggregateState::default());
        Self {
            inner: Arc::new(StateInner {
                state_tx,
                progress: ProgressBoard::new(),
                orchestrator,
                destination_dir: destination_dir.into(),
            }),
        }
    }

    pub fn destination_dir(&self) -> &Path {
        &self.inner.destination_dir
    }

    /// Current aggregate state
    pub fn snapshot(&self) -> AggregateState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AggregateState> {
        self.inner.state_tx.subscribe()
    }

    /// Current per-input progress
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.progress.snapshot()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.progress.subscribe()
    }

    /// Replace the selection
    pub fn select(&self, inputs: Vec<InputHandle>) -> Result<(), StartError> {
        self.transition(|state| {
            if state.conversion_in_progress {
                return Err(StartError::Busy);
            }
            state.selected = inputs.iter().map(|h| h.to_string()).collect();
            state.conversion_success = None;
            Ok(())
        })?;
        log::debug!("Selected {} inputs", inputs.len());
        Ok(())
    }

    /// Drop the selection and any previous result
    pub fn clear(&self) -> Result<(), StartError> {
        self.transition(|state| {
            if state.conversion_in_progress {
                return Err(StartError::Busy);
            }
            *state = AggregateState::default();
            Ok(())
        })?;
        self.inner.progress.clear();
        Ok(())
    }

    /// Start converting the current selection
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// resolves once the state has been updated with the batch result.
    pub fn start(&self) -> Result<JoinHandle<BatchOutcome>, StartError> {
        let mut inputs: Vec<InputHandle> = Vec::new();
        self.transition(|state| {
            if state.conversion_in_progress {
                return Err(StartError::Busy);
            }
            if state.selected.is_empty() {
                return Err(StartError::NothingSelected);
            }
            inputs = state.selected.iter().map(InputHandle::new).collect();
            state.conversion_in_progress = true;
            state.conversion_success = None;
            Ok(())
        })?;

        self.inner.progress.reset(inputs.len());

        let inner = self.inner.clone();
        Ok(tokio::spawn(async move {
            let orchestrator = inner.orchestrator.clone();
            let destination_dir = inner.destination_dir.clone();
            let progress = inner.progress.clone();
            let batch = tokio::spawn(async move {
                orchestrator
                    .run_batch(&inputs, &destination_dir, &progress)
                    .await
            });

            // A panicking batch must still leave the running state
            let outcome = match batch.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Conversion batch aborted: {}", e);
                    BatchOutcome {
                        failures: vec![(0, JobError::Aborted(e.to_string()))],
                        ..BatchOutcome::default()
                    }
                }
            };

            inner.state_tx.send_modify(|state| {
                state.conversion_in_progress = false;
                state.conversion_success = Some(outcome.success);
            });
            outcome
        }))
    }

    /// Apply `change` atomically; nothing is published if it is rejected
    fn transition<F>(&self, change: F) -> Result<(), StartError>
    where
        F: FnOnce(&mut AggregateState) -> Result<(), StartError>,
    {
        let mut result = Ok(());
        self.inner.state_tx.send_if_modified(|state| match change(state) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }
}
