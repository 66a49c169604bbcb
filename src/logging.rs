//! Logging setup for the converter
//!
//! Logs go to the terminal and to a file under the platform's local data
//! directory, e.g. `~/.local/share/Video2MP3/logs/video2mp3.log` on Linux.
//! The file captures debug output from the conversion pipeline; the
//! terminal only shows info and above.

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "Video2MP3";
const LOG_FILE: &str = "video2mp3.log";
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Directory the log file lives in
pub fn get_log_directory() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .map(|d| d.join(APP_DIR).join("logs"))
}

pub fn get_log_file_path() -> Option<PathBuf> {
    get_log_directory().map(|d| d.join(LOG_FILE))
}

/// Move `log_path` aside to `<name>.old` once it grows past `max_bytes`
///
/// Returns true if the file was rotated.
pub fn rotate_if_large(log_path: &Path, max_bytes: u64) -> io::Result<bool> {
    let len = match fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if len <= max_bytes {
        return Ok(false);
    }

    let mut backup = log_path.as_os_str().to_owned();
    backup.push(".old");
    fs::rename(log_path, PathBuf::from(backup))?;
    Ok(true)
}

fn log_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build()
}

/// Initialize terminal + file logging
///
/// Falls back to terminal-only logging when the log file can't be opened.
/// Returns the path of the log file in use.
pub fn init_logging() -> Option<PathBuf> {
    let Some(log_dir) = get_log_directory() else {
        eprintln!("Warning: Could not determine log directory");
        init_terminal_only();
        return None;
    };

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_terminal_only();
        return None;
    }

    let log_path = log_dir.join(LOG_FILE);
    if let Err(e) = rotate_if_large(&log_path, MAX_LOG_BYTES) {
        eprintln!("Warning: Could not rotate log file: {}", e);
    }

    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            init_terminal_only();
            return None;
        }
    };

    let config = log_config();
    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(
            LevelFilter::Info,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, config, log_file),
    ];

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    log::info!("=== Video2MP3 session started ===");
    log::info!("Log file: {}", log_path.display());

    Some(log_path)
}

fn init_terminal_only() {
    // stdout carries the JSON status lines
    let term_logger = TermLogger::new(
        LevelFilter::Info,
        log_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    let _ = CombinedLogger::init(vec![term_logger]);
}
