//! Publishing finished files to the shared audio library

use std::io;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::fs::OpenOptions;

/// MIME type for every published file
pub const MP3_MIME_TYPE: &str = "audio/mpeg";

/// A file as registered in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub display_name: String,
    pub mime_type: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Sink that makes finished files discoverable to other applications
pub trait MediaLibrary: Send + Sync {
    fn publish<'a>(
        &'a self,
        file: &'a Path,
        mime_type: &'a str,
    ) -> BoxFuture<'a, io::Result<LibraryEntry>>;
}

/// Display name used for a file published at `timestamp_ms`
pub fn display_name_for(timestamp_ms: i64) -> String {
    format!("converted_audio_{}.mp3", timestamp_ms)
}

/// Library backed by a plain directory (the user's Music folder by default)
#[derive(Debug, Clone)]
pub struct FolderLibrary {
    root: PathBuf,
}

impl FolderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Claim a fresh display name, bumping the timestamp past existing files
    async fn reserve(&self) -> io::Result<(String, tokio::fs::File)> {
        let mut timestamp = chrono::Local::now().timestamp_millis();
        loop {
            let name = display_name_for(timestamp);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&name))
                .await
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => timestamp += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl MediaLibrary for FolderLibrary {
    fn publish<'a>(
        &'a self,
        file: &'a Path,
        mime_type: &'a str,
    ) -> BoxFuture<'a, io::Result<LibraryEntry>> {
        async move {
            tokio::fs::create_dir_all(&self.root).await?;

            let mut source = tokio::fs::File::open(file).await?;
            let (display_name, mut target) = self.reserve().await?;
            let path = self.root.join(&display_name);

            let copied = match tokio::io::copy(&mut source, &mut target).await {
                Ok(n) => n,
                Err(e) => {
                    drop(target);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(e);
                }
            };
            target.sync_all().await?;

            Ok(LibraryEntry {
                display_name,
                mime_type: mime_type.to_string(),
                path,
                size: copied,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_name_pattern() {
        assert_eq!(display_name_for(1700000000123), "converted_audio_1700000000123.mp3");
    }

    #[tokio::test]
    async fn test_publish_copies_into_library() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("out.mp3");
        std::fs::write(&source, b"ID3 fake mp3").unwrap();
        let library = FolderLibrary::new(temp.path().join("Music"));

        let entry = library.publish(&source, MP3_MIME_TYPE).await.unwrap();

        assert_eq!(entry.mime_type, "audio/mpeg");
        assert_eq!(entry.size, 12);
        assert!(entry.display_name.starts_with("converted_audio_"));
        assert!(entry.display_name.ends_with(".mp3"));
        assert_eq!(entry.path, library.root().join(&entry.display_name));
        assert_eq!(std::fs::read(&entry.path).unwrap(), b"ID3 fake mp3");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_publish_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("out.mp3");
        std::fs::write(&source, b"mp3").unwrap();
        let library = FolderLibrary::new(temp.path().join("Music"));

        let mut names = Vec::new();
        for _ in 0..5 {
            names.push(library.publish(&source, MP3_MIME_TYPE).await.unwrap().display_name);
        }
        names.sort();
        names.dedup();

        assert_eq!(names.len(), 5);
        assert_eq!(std::fs::read_dir(library.root()).unwrap().count(), 5);
    }

    #[tokio::test]
    async fn test_publish_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let library = FolderLibrary::new(temp.path().join("Music"));

        let result = library.publish(&temp.path().join("nope.mp3"), MP3_MIME_TYPE).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(library.root()).unwrap().count(), 0);
    }
}
