use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Check if a file is a video file based on its extension
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "mp4" | "mkv" | "mov" | "avi" | "webm" | "m4v" | "3gp" | "flv" | "wmv" | "mpg"
                | "mpeg" | "ts"
        )
    } else {
        false
    }
}

/// Find every video file under `dir`, sorted by path
pub fn find_video_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
