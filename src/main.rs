//! Video2MP3 - headless converter
//!
//! Usage: `video-to-mp3 <video or folder>...`
//!
//! Folders are searched recursively for video files. State changes and
//! progress snapshots are printed to stdout as JSON lines; logs go to
//! stderr and the log file.

use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::json;
use video_to_mp3::conversion::{InputHandle, Orchestrator};
use video_to_mp3::core::{ConverterConfig, ConverterState};
use video_to_mp3::logging::init_logging;
use video_to_mp3::media::find_video_files;

fn collect_inputs(args: impl Iterator<Item = String>) -> Vec<InputHandle> {
    let mut inputs = Vec::new();
    for arg in args {
        let path = PathBuf::from(&arg);
        if path.is_dir() {
            let found = find_video_files(&path);
            if found.is_empty() {
                log::warn!("No video files found in {}", path.display());
            }
            inputs.extend(found.iter().map(|p| InputHandle::from(p.as_path())));
        } else {
            inputs.push(InputHandle::new(arg));
        }
    }
    inputs
}

/// Print state and progress changes until the task is aborted
fn spawn_printer(state: &ConverterState) -> tokio::task::JoinHandle<()> {
    let mut state_rx = state.subscribe_state();
    let mut progress_rx = state.subscribe_progress();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = state_rx.borrow_and_update().clone();
                    println!("{}", json!({ "state": snapshot, "phase": snapshot.phase() }));
                }
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = progress_rx.borrow_and_update().clone();
                    println!("{}", json!({ "progress": snapshot }));
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let inputs = collect_inputs(std::env::args().skip(1));
    if inputs.is_empty() {
        eprintln!("Usage: video-to-mp3 <video or folder>...");
        return ExitCode::from(2);
    }

    let config = match ConverterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    log::info!(
        "Using ffmpeg at {:?}, {} parallel transcodes, library {:?}",
        config.ffmpeg_path,
        config.max_parallel_transcodes,
        config.library_dir
    );

    let orchestrator = Orchestrator::from_config(&config);
    let state = ConverterState::new(orchestrator, config.work_dir.clone());
    let printer = spawn_printer(&state);

    let started = state.select(inputs).and_then(|()| state.start());
    let handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Could not start conversion: {}", e);
            printer.abort();
            return ExitCode::from(2);
        }
    };

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Conversion task failed: {}", e);
            printer.abort();
            return ExitCode::FAILURE;
        }
    };
    printer.abort();

    println!(
        "{}",
        json!({ "state": state.snapshot(), "progress": state.progress() })
    );
    for entry in &outcome.published {
        println!("{}", json!({ "published": entry }));
    }
    for (index, error) in &outcome.failures {
        log::error!("Input {} failed: {}", index, error);
    }

    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
