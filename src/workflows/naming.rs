use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Subtitle formats offered by the service's advanced search.
pub const SUBTITLE_EXTENSIONS: &[&str] = &[".sub", ".srt", ".ssa", ".smi", ".mpl"];

/// Where the subtitle for `video` is written. With a single language the
/// subtitle shares the video's base name; with several, the language code
/// goes before the extension.
pub fn subtitle_path(video: &Path, language: &str, extension: &str, multi: bool) -> PathBuf {
    let suffix = if multi {
        format!(".{language}{extension}")
    } else {
        extension.to_string()
    };
    with_suffix(video, &suffix)
}

pub fn has_subtitle(video: &Path, language: &str, multi: bool) -> bool {
    SUBTITLE_EXTENSIONS
        .iter()
        .any(|ext| subtitle_path(video, language, ext, multi).is_file())
}

/// The container produced by merging subtitles into `video`.
pub fn merge_target(video: &Path) -> PathBuf {
    with_suffix(video, ".mkv")
}

pub fn is_merge_format(video: &Path) -> bool {
    video
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("mkv"))
        .unwrap_or(false)
}

fn with_suffix(video: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = video.file_stem().unwrap_or_default().to_os_string();
    name.push(suffix);
    video.with_file_name(name)
}
