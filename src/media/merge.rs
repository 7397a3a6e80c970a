use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Result, SubtitleError};
use crate::workflows::naming;

/// Embeds subtitles into a video container.
pub trait Merger: Send + Sync {
    fn is_available(&self) -> bool;

    /// `subtitles` are (language, subtitle path) pairs.
    fn merge(&self, video: &Path, subtitles: &[(String, PathBuf)]) -> Result<()>;
}

pub struct MkvMerge {
    program: OsString,
}

impl MkvMerge {
    pub fn new() -> Self {
        Self {
            program: OsString::from("mkvmerge"),
        }
    }
}

impl Default for MkvMerge {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger for MkvMerge {
    fn is_available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output() {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("mkvmerge --version failed: {e}");
                false
            }
        }
    }

    fn merge(&self, video: &Path, subtitles: &[(String, PathBuf)]) -> Result<()> {
        let args = merge_args(video, subtitles);
        debug!("Running mkvmerge {args:?}");

        let output = match Command::new(&self.program).args(&args).output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SubtitleError::MergeToolMissing);
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(SubtitleError::MergeFailure { output: text });
        }

        Ok(())
    }
}

pub fn merge_args(video: &Path, subtitles: &[(String, PathBuf)]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--output".into(),
        naming::merge_target(video).into_os_string(),
        video.as_os_str().to_os_string(),
    ];

    let mut sorted: Vec<&(String, PathBuf)> = subtitles.iter().collect();
    sorted.sort();
    for (language, subtitle) in sorted {
        args.push("--language".into());
        args.push(format!("0:{}", to_iso639_2(language)).into());
        args.push(subtitle.as_os_str().to_os_string());
    }

    args
}

/// Maps the service's non-standard language codes to ISO 639-2.
pub fn to_iso639_2(language: &str) -> &str {
    match language {
        "pob" | "pb" => "por",
        other => other,
    }
}
