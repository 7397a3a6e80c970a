use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mpg", "mkv"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands the given inputs into a sorted, de-duplicated list of video
/// files. Files named directly are always accepted; directories are
/// listed and filtered by extension.
pub fn find_movie_files(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();

    for input in inputs {
        if input.is_file() {
            found.insert(absolute(input));
        } else if input.is_dir() {
            collect_video_files(input, recursive, &mut found)?;
        } else {
            debug!("Ignoring missing input {input:?}");
        }
    }

    Ok(found.into_iter().collect())
}

fn collect_video_files(dir_path: &Path, recurse: bool, found: &mut BTreeSet<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_file() {
            if is_video_file(&path) {
                found.insert(absolute(&path));
            }
        } else if path.is_dir() && recurse {
            collect_video_files(&path, recurse, found)?;
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
