//! Core converter state
//!
//! This module contains:
//! - Runtime configuration (ffmpeg location, working and library folders)
//! - Per-input progress snapshots
//! - The observable state machine driven by the presentation layer

mod progress;
mod settings;
mod state;

pub use progress::{ProgressBoard, ProgressSnapshot};
pub use settings::{
    ConfigError, ConverterConfig, ENV_FFMPEG, ENV_JOBS, ENV_LIBRARY_DIR, ENV_WORK_DIR,
    default_parallel_transcodes, find_ffmpeg,
};
pub use state::{AggregateState, ConverterState, Phase, StartError};
