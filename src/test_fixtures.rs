//! Test fixtures for conversion tests
//!
//! Nothing here needs a real ffmpeg. Fake "videos" are small text files
//! whose content scripts what the [`FakeEngine`] does when it is handed
//! the staged copy.

#![cfg(test)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::conversion::{
    EngineCallbacks, LibraryEntry, MediaLibrary, ReturnCode, TranscodeCommand, TranscodeEngine,
};

/// What the fake engine does for one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Report each position (ms), write the output, succeed
    Succeed { positions: Vec<u64> },
    /// Report each position, leave a partial output, fail with `code`
    Fail { positions: Vec<u64>, code: i32 },
    /// Succeed without writing anything
    SucceedWithoutOutput,
    /// Report 500ms, succeed, then keep calling back after completion
    LateCallbacks,
}

impl FakeBehavior {
    fn to_script(&self) -> String {
        fn join(positions: &[u64]) -> String {
            positions
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            FakeBehavior::Succeed { positions } => {
                format!("positions={}\nresult=success\n", join(positions))
            }
            FakeBehavior::Fail { positions, code } => {
                format!("positions={}\nresult=fail:{}\n", join(positions), code)
            }
            FakeBehavior::SucceedWithoutOutput => "positions=\nresult=no-output\n".to_string(),
            FakeBehavior::LateCallbacks => "positions=500\nresult=late\n".to_string(),
        }
    }

    fn from_script(script: &str) -> Option<Self> {
        let mut positions = Vec::new();
        let mut result = None;
        for line in script.lines() {
            if let Some(list) = line.strip_prefix("positions=") {
                positions = list
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse().ok())
                    .collect::<Option<Vec<u64>>>()?;
            } else if let Some(r) = line.strip_prefix("result=") {
                result = Some(r.to_string());
            }
        }
        match result?.as_str() {
            "success" => Some(FakeBehavior::Succeed { positions }),
            "no-output" => Some(FakeBehavior::SucceedWithoutOutput),
            "late" => Some(FakeBehavior::LateCallbacks),
            other => {
                let code = other.strip_prefix("fail:")?.parse().ok()?;
                Some(FakeBehavior::Fail { positions, code })
            }
        }
    }
}

/// Write a fake video whose content scripts the engine's behavior
pub fn write_fake_video(dir: &Path, name: &str, behavior: &FakeBehavior) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create fixture directory");
    let path = dir.join(name);
    std::fs::write(&path, behavior.to_script()).expect("Failed to write fake video");
    path
}

/// Duration probe that claims every input is one second long
pub fn fixed_duration(_path: &Path) -> u64 {
    1000
}

/// Count staged inputs left in a work directory
pub fn staged_leftovers(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp_input_"))
            .count(),
        Err(_) => 0,
    }
}

/// Engine that follows the script found in each staged input
///
/// Callbacks come from a plain thread, like a native engine's would.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    commands: Arc<Mutex<Vec<TranscodeCommand>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command this engine has been asked to run
    pub fn commands(&self) -> Vec<TranscodeCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl TranscodeEngine for FakeEngine {
    fn execute(&self, command: TranscodeCommand, callbacks: EngineCallbacks) {
        self.commands.lock().unwrap().push(command.clone());

        std::thread::spawn(move || {
            let behavior = std::fs::read_to_string(&command.input)
                .ok()
                .and_then(|s| FakeBehavior::from_script(&s));

            let Some(behavior) = behavior else {
                callbacks.complete(ReturnCode::Error(Some(1)));
                return;
            };

            match behavior {
                FakeBehavior::Succeed { positions } => {
                    for p in positions {
                        callbacks.time_position(p);
                        std::thread::sleep(Duration::from_millis(2));
                    }
                    std::fs::write(&command.output, b"ID3fake").unwrap();
                    callbacks.complete(ReturnCode::Success);
                }
                FakeBehavior::Fail { positions, code } => {
                    for p in positions {
                        callbacks.time_position(p);
                    }
                    std::fs::write(&command.output, b"partial").unwrap();
                    callbacks.complete(ReturnCode::Error(Some(code)));
                }
                FakeBehavior::SucceedWithoutOutput => {
                    callbacks.complete(ReturnCode::Success);
                }
                FakeBehavior::LateCallbacks => {
                    callbacks.time_position(500);
                    std::fs::write(&command.output, b"ID3fake").unwrap();
                    callbacks.complete(ReturnCode::Success);
                    callbacks.time_position(900);
                    callbacks.complete(ReturnCode::Error(Some(2)));
                }
            }
        });
    }
}

/// In-memory library that records what was published
#[derive(Debug, Default)]
pub struct RecordingLibrary {
    published: Mutex<Vec<(PathBuf, String)>>,
    fail: bool,
}

impl RecordingLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library that rejects every file
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(PathBuf, String)> {
        self.published.lock().unwrap().clone()
    }
}

impl MediaLibrary for RecordingLibrary {
    fn publish<'a>(
        &'a self,
        file: &'a Path,
        mime_type: &'a str,
    ) -> BoxFuture<'a, io::Result<LibraryEntry>> {
        async move {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "library is read-only"));
            }
            let size = std::fs::metadata(file)?.len();
            let mut published = self.published.lock().unwrap();
            published.push((file.to_path_buf(), mime_type.to_string()));
            Ok(LibraryEntry {
                display_name: format!("converted_audio_{}.mp3", published.len()),
                mime_type: mime_type.to_string(),
                path: file.to_path_buf(),
                size,
            })
        }
        .boxed()
    }
}

#[test]
fn test_script_round_trip() {
    let behaviors = [
        FakeBehavior::Succeed {
            positions: vec![1, 2, 3],
        },
        FakeBehavior::Fail {
            positions: vec![],
            code: 7,
        },
        FakeBehavior::SucceedWithoutOutput,
        FakeBehavior::LateCallbacks,
    ];
    for behavior in behaviors {
        assert_eq!(
            FakeBehavior::from_script(&behavior.to_script()),
            Some(behavior)
        );
    }
}
