//! Video to MP3 converter
//!
//! Converts a selection of video files into MP3 audio, running the
//! conversions concurrently and publishing the results to a media library
//! only when every one of them succeeded.
//!
//! The presentation layer drives a [`core::ConverterState`]: it selects
//! inputs, starts a batch and watches the aggregate state and per-input
//! progress snapshots.

pub mod conversion;
pub mod core;
pub mod logging;
pub mod media;

#[cfg(test)]
mod test_fixtures;
