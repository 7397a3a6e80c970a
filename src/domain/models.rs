use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Structured metadata guessed from a release-style filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guess {
    pub kind: Option<MediaKind>,
    pub title: Option<String>,
    pub episode_title: Option<String>,
    pub release_group: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Episode,
    Movie,
}

/// A single query parameter value. The service accepts strings and
/// integers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Named parameters submitted to the subtitle service for one
/// (file, language) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    params: BTreeMap<String, QueryValue>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(key.to_string(), QueryValue::Text(value.into()));
        self
    }

    pub fn with_int(mut self, key: &str, value: i64) -> Self {
        self.params.insert(key.to_string(), QueryValue::Int(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(QueryValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self.params.get("sublanguageid") {
            Some(QueryValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.params.iter()
    }
}

/// A subtitle record returned by the service, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub release_name: String,
    pub download_link: String,
    pub format: String,
    pub download_count: u64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// The subtitle chosen for one (file, language) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMatch {
    pub download_link: String,
    /// Leading dot plus lowercase format name, e.g. `.srt`.
    pub extension: String,
}

impl From<&SearchResult> for RankedMatch {
    fn from(result: &SearchResult) -> Self {
        Self {
            download_link: result.download_link.clone(),
            extension: format!(".{}", result.format.trim().to_lowercase()),
        }
    }
}

/// One unit of search+download work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DownloadTask {
    pub video: PathBuf,
    pub language: String,
}

impl DownloadTask {
    pub fn new(video: &Path, language: &str) -> Self {
        Self {
            video: video.to_path_buf(),
            language: language.to_string(),
        }
    }

    pub fn basename(&self) -> String {
        self.video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
