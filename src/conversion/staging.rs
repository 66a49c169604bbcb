//! Copies opaque inputs into local files the engine can address by path

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use super::job::JobError;

/// Extension used for staged inputs when the handle has none
const DEFAULT_EXTENSION: &str = "mp4";

/// Opaque reference to one selected input
///
/// Either a plain filesystem path or a `file://` URI. The original string
/// is kept as the input's display identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InputHandle(String);

impl InputHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local path this handle refers to, if it is a path or `file://` URI
    pub fn to_local_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.0.strip_prefix("file://") {
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            return rest.starts_with('/').then(|| PathBuf::from(rest));
        }
        if self.0.contains("://") || self.0.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.0))
    }

    /// Lowercased file extension, if it looks like a real one
    pub fn extension(&self) -> Option<String> {
        let name = self.0.rsplit(['/', '\\']).next()?;
        let (_, ext) = name.rsplit_once('.')?;
        let valid = !ext.is_empty()
            && ext.len() <= 5
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for InputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InputHandle {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Path> for InputHandle {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

/// A readable byte stream for one input
pub struct ContentStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Total size when the source knows it (logging only)
    pub size_hint: Option<u64>,
}

/// Resolves input handles to byte streams
pub trait ContentSource: Send + Sync {
    fn open<'a>(&'a self, handle: &'a InputHandle) -> BoxFuture<'a, io::Result<ContentStream>>;
}

/// Content source for local paths and `file://` URIs
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentSource;

impl ContentSource for FileContentSource {
    fn open<'a>(&'a self, handle: &'a InputHandle) -> BoxFuture<'a, io::Result<ContentStream>> {
        async move {
            let path = handle.to_local_path().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported input handle: {}", handle),
                )
            })?;
            let file = tokio::fs::File::open(&path).await?;
            let metadata = file.metadata().await?;
            if !metadata.is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a regular file: {}", path.display()),
                ));
            }
            Ok(ContentStream {
                reader: Box::new(file),
                size_hint: Some(metadata.len()),
            })
        }
        .boxed()
    }
}

/// A staged copy of an input, deleted when dropped
#[derive(Debug)]
pub struct StagedInput {
    path: PathBuf,
}

impl StagedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedInput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed staged input {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove staged input {:?}: {}", self.path, e),
        }
    }
}

/// Copy `handle` into a new local file under `destination_dir`
///
/// The copy is complete and flushed before this returns. On any failure
/// the partial file is removed.
pub async fn stage(
    source: &dyn ContentSource,
    handle: &InputHandle,
    destination_dir: &Path,
) -> Result<StagedInput, JobError> {
    let stream = source
        .open(handle)
        .await
        .map_err(|e| JobError::ResourceUnreadable {
            input: handle.to_string(),
            source: e,
        })?;

    tokio::fs::create_dir_all(destination_dir)
        .await
        .map_err(JobError::Staging)?;

    let extension = handle
        .extension()
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    let staged = StagedInput {
        path: destination_dir.join(format!(
            "temp_input_{}.{}",
            Uuid::new_v4().simple(),
            extension
        )),
    };

    let mut file = tokio::fs::File::create(staged.path())
        .await
        .map_err(JobError::Staging)?;
    let mut reader = stream.reader;
    let copied = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(JobError::Staging)?;
    file.flush().await.map_err(JobError::Staging)?;
    file.sync_all().await.map_err(JobError::Staging)?;

    log::debug!(
        "Staged {} ({} of {:?} bytes) at {:?}",
        handle,
        copied,
        stream.size_hint,
        staged.path()
    );
    Ok(staged)
}
