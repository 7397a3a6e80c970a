use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while searching, downloading and merging subtitles.
#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("{path:?} must have at least {min} bytes (has {size})", min = crate::media::hash::MINIMUM_SIZE)]
    FileTooSmall { path: PathBuf, size: u64 },

    #[error("Could not classify {0:?}")]
    Classification(String),

    #[error("Malformed response from subtitle service: {0}")]
    Protocol(String),

    #[error("Login to subtitle service failed: {0}")]
    Authentication(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("mkvmerge not found in PATH")]
    MergeToolMissing,

    #[error("mkvmerge failed")]
    MergeFailure { output: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SubtitleError {
    /// Errors that imply a broken contract with the service rather than a
    /// problem with one file. These abort the whole batch. Transport and
    /// HTTP status failures (`Http`) stay local to their unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SubtitleError::Protocol(_)
                | SubtitleError::Authentication(_)
                | SubtitleError::MergeToolMissing
        )
    }
}

pub type Result<T> = std::result::Result<T, SubtitleError>;
