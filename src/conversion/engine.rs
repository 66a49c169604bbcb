//! Seam over the external transcoding engine
//!
//! The engine is callback driven. `execute` returns immediately; the engine
//! later reports zero or more time positions and then exactly one
//! completion through the [`EngineCallbacks`] it was handed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

/// Output sample rate (Hz)
pub const SAMPLE_RATE_HZ: u32 = 44_100;
/// Output channel count
pub const CHANNELS: u32 = 2;
/// Output audio bitrate (kbps)
pub const BITRATE_KBPS: u32 = 192;
/// Encoder used for the MP3 stream
pub const AUDIO_CODEC: &str = "libmp3lame";

/// One conversion command: a staged input and the file to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCommand {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TranscodeCommand {
    pub fn new(input: &Path, output: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }

    /// Command-line arguments in ffmpeg syntax
    ///
    /// -y          : overwrite the candidate output
    /// -vn         : drop every video stream
    /// -ar / -ac   : 44.1kHz stereo
    /// -b:a        : 192k audio bitrate
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(14);
        args.push("-y".into());
        args.push("-i".into());
        args.push(self.input.clone().into_os_string());
        args.push("-vn".into());
        args.push("-codec:a".into());
        args.push(AUDIO_CODEC.into());
        args.push("-ar".into());
        args.push(SAMPLE_RATE_HZ.to_string().into());
        args.push("-ac".into());
        args.push(CHANNELS.to_string().into());
        args.push("-b:a".into());
        args.push(format!("{}k", BITRATE_KBPS).into());
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Terminal result reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    /// The engine ran and failed; carries the exit code when there is one
    Error(Option<i32>),
    /// The engine could not be run at all
    Unavailable(String),
}

impl ReturnCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ReturnCode::Success)
    }
}

/// Callback-driven transcoding engine
///
/// Implementations must eventually call [`EngineCallbacks::complete`].
/// Dropping every clone of the callbacks without completing is reported
/// to the waiting job as [`ReturnCode::Unavailable`].
pub trait TranscodeEngine: Send + Sync {
    fn execute(&self, command: TranscodeCommand, callbacks: EngineCallbacks);
}

type TimeHandler = Box<dyn Fn(u64) + Send + Sync>;

struct Bridge {
    on_time: TimeHandler,
    done: Mutex<Option<oneshot::Sender<ReturnCode>>>,
}

/// Callbacks handed to the engine for one command
///
/// Resolves exactly once. Time positions arriving after the completion
/// are dropped, and so are repeated completions.
#[derive(Clone)]
pub struct EngineCallbacks {
    inner: Arc<Bridge>,
}

impl EngineCallbacks {
    pub(crate) fn new<F>(on_time: F, done: oneshot::Sender<ReturnCode>) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Bridge {
                on_time: Box::new(on_time),
                done: Mutex::new(Some(done)),
            }),
        }
    }

    /// Report the current output position, in milliseconds
    pub fn time_position(&self, millis: u64) {
        // Held across the handler so a racing completion cannot slip in
        // between the check and the forward.
        let done = self.inner.done.lock().unwrap_or_else(PoisonError::into_inner);
        if done.is_some() {
            (self.inner.on_time)(millis);
        }
    }

    /// Report the terminal result
    pub fn complete(&self, code: ReturnCode) {
        let sender = self
            .inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                let _ = tx.send(code);
            }
            None => log::debug!("Ignoring repeated engine completion: {:?}", code),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("complete", &self.is_complete())
            .finish()
    }
}
