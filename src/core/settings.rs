//! Converter configuration
//!
//! Resolved once at startup from built-in defaults, with a handful of
//! environment overrides. Nothing is read from or written to disk here.

use std::path::PathBuf;

use thiserror::Error;

/// Path to the ffmpeg binary
pub const ENV_FFMPEG: &str = "VIDEO2MP3_FFMPEG";
/// Directory for staged inputs and converted outputs
pub const ENV_WORK_DIR: &str = "VIDEO2MP3_WORK_DIR";
/// Directory that plays the role of the shared audio library
pub const ENV_LIBRARY_DIR: &str = "VIDEO2MP3_LIBRARY_DIR";
/// Maximum number of engine processes running at once
pub const ENV_JOBS: &str = "VIDEO2MP3_JOBS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ffmpeg binary not found. Expected at resources/bin/ffmpeg or on PATH")]
    FfmpegNotFound,

    #[error("{var} points to a file that does not exist: {}", path.display())]
    MissingFile { var: &'static str, path: PathBuf },

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("could not determine the {0} directory")]
    NoDirectory(&'static str),
}

/// Runtime configuration for a converter instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// ffmpeg executable used by the default engine
    pub ffmpeg_path: PathBuf,
    /// Where staged inputs and candidate outputs are written
    pub work_dir: PathBuf,
    /// Where finished files are published
    pub library_dir: PathBuf,
    /// Upper bound on concurrently running transcodes
    pub max_parallel_transcodes: usize,
}

impl ConverterConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ffmpeg_path = match lookup(ENV_FFMPEG) {
            Some(value) => {
                let path = PathBuf::from(value);
                if !path.exists() {
                    return Err(ConfigError::MissingFile {
                        var: ENV_FFMPEG,
                        path,
                    });
                }
                path
            }
            None => find_ffmpeg().ok_or(ConfigError::FfmpegNotFound)?,
        };

        let work_dir = lookup(ENV_WORK_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_work_dir);

        let library_dir = match lookup(ENV_LIBRARY_DIR) {
            Some(value) => PathBuf::from(value),
            None => default_library_dir().ok_or(ConfigError::NoDirectory("music"))?,
        };

        let max_parallel_transcodes = match lookup(ENV_JOBS) {
            Some(value) => parse_job_count(&value)?,
            None => default_parallel_transcodes(),
        };

        Ok(Self {
            ffmpeg_path,
            work_dir,
            library_dir,
            max_parallel_transcodes,
        })
    }
}

fn parse_job_count(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            var: ENV_JOBS,
            value: value.to_string(),
        }),
    }
}

/// Default number of concurrent transcodes
///
/// 75% of the available cores, clamped between 2 and 8.
pub fn default_parallel_transcodes() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    ((available as f32 * 0.75).ceil() as usize).clamp(2, 8)
}

/// Default working directory for staged and converted files
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("video2mp3_output")
}

/// Default library directory: the user's audio folder, else ~/Music
pub fn default_library_dir() -> Option<PathBuf> {
    dirs::audio_dir().or_else(|| dirs::home_dir().map(|h| h.join("Music")))
}

/// Locate an ffmpeg binary
///
/// Looks for a bundled copy first (next to the manifest in development,
/// next to the executable in release builds), then falls back to PATH.
pub fn find_ffmpeg() -> Option<PathBuf> {
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let dev_path = PathBuf::from(manifest_dir)
            .join("resources")
            .join("bin")
            .join("ffmpeg");

        if dev_path.exists() {
            log::debug!("Found ffmpeg at development path: {:?}", dev_path);
            return Some(dev_path);
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let local_path = exe_dir.join("resources").join("bin").join("ffmpeg");
            if local_path.exists() {
                log::debug!("Found ffmpeg at local path: {:?}", local_path);
                return Some(local_path);
            }
        }
    }

    match which::which("ffmpeg") {
        Ok(path) => {
            log::debug!("Found ffmpeg on PATH: {:?}", path);
            Some(path)
        }
        Err(_) => None,
    }
}
