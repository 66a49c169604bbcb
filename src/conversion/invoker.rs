//! Turns one callback-driven engine run into a single awaitable result

use std::path::Path;

use tokio::sync::oneshot;

use super::engine::{EngineCallbacks, ReturnCode, TranscodeCommand, TranscodeEngine};

/// Convert an engine time position into a percentage of the input duration
///
/// Returns `None` when the duration is unknown (0), which disables
/// percentage reporting for the job.
pub fn progress_percent(position_ms: u64, duration_ms: u64) -> Option<f32> {
    if duration_ms == 0 {
        return None;
    }
    let percent = position_ms as f64 / duration_ms as f64 * 100.0;
    Some(percent.min(100.0) as f32)
}

/// Run one conversion and wait for the engine's terminal callback
///
/// `on_progress` receives percentages (0-100) derived from the engine's
/// time positions. This never resolves before the completion callback,
/// however the progress callbacks are timed.
pub async fn invoke<F>(
    engine: &dyn TranscodeEngine,
    input: &Path,
    output: &Path,
    duration_hint_ms: u64,
    on_progress: F,
) -> ReturnCode
where
    F: Fn(f32) + Send + Sync + 'static,
{
    let (tx, rx) = oneshot::channel();
    let callbacks = EngineCallbacks::new(
        move |position_ms| {
            if let Some(percent) = progress_percent(position_ms, duration_hint_ms) {
                on_progress(percent);
            }
        },
        tx,
    );

    engine.execute(TranscodeCommand::new(input, output), callbacks);

    rx.await.unwrap_or_else(|_| {
        ReturnCode::Unavailable("engine dropped the command without completing".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FakeBehavior, FakeEngine, write_fake_video};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 1000), Some(0.0));
        assert_eq!(progress_percent(250, 1000), Some(25.0));
        assert_eq!(progress_percent(1000, 1000), Some(100.0));
        assert_eq!(progress_percent(1500, 1000), Some(100.0));
    }

    #[test]
    fn test_progress_percent_unknown_duration() {
        assert_eq!(progress_percent(500, 0), None);
    }

    #[tokio::test]
    async fn test_invoke_forwards_progress_and_result() {
        let temp = TempDir::new().unwrap();
        let input = write_fake_video(
            temp.path(),
            "clip.mp4",
            &FakeBehavior::Succeed {
                positions: vec![250, 500, 1000],
            },
        );
        let output = temp.path().join("out.mp3");
        let engine = FakeEngine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let code = invoke(&engine, &input, &output, 1000, move |p| {
            seen_clone.lock().unwrap().push(p);
        })
        .await;

        assert_eq!(code, ReturnCode::Success);
        assert!(output.exists());
        assert_eq!(*seen.lock().unwrap(), vec![25.0, 50.0, 100.0]);
        assert_eq!(engine.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_unknown_duration_reports_no_progress() {
        let temp = TempDir::new().unwrap();
        let input = write_fake_video(
            temp.path(),
            "clip.mp4",
            &FakeBehavior::Succeed {
                positions: vec![100, 200],
            },
        );
        let output = temp.path().join("out.mp3");
        let engine = FakeEngine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let code = invoke(&engine, &input, &output, 0, move |p| {
            seen_clone.lock().unwrap().push(p);
        })
        .await;

        assert!(code.is_success());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_reports_engine_failure() {
        let temp = TempDir::new().unwrap();
        let input = write_fake_video(
            temp.path(),
            "clip.mp4",
            &FakeBehavior::Fail {
                positions: vec![10],
                code: 1,
            },
        );
        let output = temp.path().join("out.mp3");

        let code = invoke(&FakeEngine::new(), &input, &output, 100, |_| {}).await;
        assert_eq!(code, ReturnCode::Error(Some(1)));
    }

    #[tokio::test]
    async fn test_invoke_ignores_late_callbacks() {
        let temp = TempDir::new().unwrap();
        let input = write_fake_video(temp.path(), "clip.mp4", &FakeBehavior::LateCallbacks);
        let output = temp.path().join("out.mp3");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let code = invoke(&FakeEngine::new(), &input, &output, 1000, move |p| {
            seen_clone.lock().unwrap().push(p);
        })
        .await;

        assert_eq!(code, ReturnCode::Success);
        assert_eq!(*seen.lock().unwrap(), vec![50.0]);
    }

    struct SilentEngine;

    impl TranscodeEngine for SilentEngine {
        fn execute(&self, _command: TranscodeCommand, callbacks: EngineCallbacks) {
            drop(callbacks);
        }
    }

    #[tokio::test]
    async fn test_invoke_engine_that_never_completes() {
        let code = invoke(
            &SilentEngine,
            Path::new("/in.mp4"),
            Path::new("/out.mp3"),
            0,
            |_| {},
        )
        .await;
        assert!(matches!(code, ReturnCode::Unavailable(_)));
    }
}
