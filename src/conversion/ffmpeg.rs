//! FFmpeg subprocess engine
//!
//! Runs one `ffmpeg` process per command on the tokio runtime. Progress is
//! read from `-progress pipe:1` on stdout; stderr is drained concurrently
//! and its last line is logged when the run fails.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::engine::{EngineCallbacks, ReturnCode, TranscodeCommand, TranscodeEngine};

/// Transcoding engine backed by an ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

impl TranscodeEngine for FfmpegEngine {
    /// Must be called from within a tokio runtime.
    fn execute(&self, command: TranscodeCommand, callbacks: EngineCallbacks) {
        let ffmpeg = self.ffmpeg_path.clone();
        tokio::spawn(async move {
            let code = run_ffmpeg(&ffmpeg, &command, &callbacks).await;
            callbacks.complete(code);
        });
    }
}

/// Extract the output position (ms) from one `-progress` line
///
/// ffmpeg reports `out_time_us` and the misnamed `out_time_ms`, both in
/// microseconds. `N/A` and negative start-up values yield `None`.
pub fn parse_progress_line(line: &str) -> Option<u64> {
    let line = line.trim();
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;

    value.trim().parse::<u64>().ok().map(|micros| micros / 1000)
}

/// Full ffmpeg argument list: progress reporting, then the conversion
fn command_line(command: &TranscodeCommand) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
    ];
    args.extend(command.args());
    args
}

async fn run_ffmpeg(
    ffmpeg_path: &Path,
    command: &TranscodeCommand,
    callbacks: &EngineCallbacks,
) -> ReturnCode {
    let args = command_line(command);
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    log::debug!("Running {} {:?}", ffmpeg_path.display(), args);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ReturnCode::Unavailable(format!("Failed to spawn ffmpeg: {}", e)),
    };

    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(position_ms) = parse_progress_line(&line) {
                callbacks.time_position(position_ms);
            }
        }
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => return ReturnCode::Unavailable(format!("Failed to wait for ffmpeg: {}", e)),
    };

    if status.success() {
        return ReturnCode::Success;
    }

    let stderr = match stderr_task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };
    log::warn!(
        "ffmpeg exited with status {}: {}",
        status,
        stderr.lines().last().unwrap_or("Unknown error")
    );
    ReturnCode::Error(status.code())
}
