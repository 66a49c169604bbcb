//! Video to MP3 conversion
//!
//! Stages each selected input, drives the transcoding engine over it and
//! hands the finished MP3s to the media library once the whole batch has
//! succeeded.

mod engine;
mod ffmpeg;
mod invoker;
mod job;
mod library;
mod orchestrator;
mod staging;

pub use engine::{
    AUDIO_CODEC, BITRATE_KBPS, CHANNELS, EngineCallbacks, ReturnCode, SAMPLE_RATE_HZ,
    TranscodeCommand, TranscodeEngine,
};
pub use ffmpeg::{FfmpegEngine, parse_progress_line};
pub use invoker::{invoke, progress_percent};
pub use job::{ConversionJob, ConversionRequest, DurationProbe, JobError, JobOutcome};
pub use library::{FolderLibrary, LibraryEntry, MP3_MIME_TYPE, MediaLibrary, display_name_for};
pub use orchestrator::{BatchOutcome, Orchestrator, output_path_for};
pub use staging::{
    ContentSource, ContentStream, FileContentSource, InputHandle, StagedInput, stage,
};
