use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::domain::models::{Guess, MediaKind, SearchQuery};
use crate::error::{Result, SubtitleError};
use crate::media::hash;

type Fingerprint = (String, u64);
type Slot = Arc<Mutex<Option<Fingerprint>>>;

/// Builds the two queries submitted for each (file, language) pair: the
/// free-text query first, the fingerprint query second.
pub struct QueryBuilder {
    // one slot per path; a worker holds the slot while hashing so each
    // file is read at most once across languages
    fingerprints: Mutex<HashMap<PathBuf, Slot>>,
    hasher: fn(&Path) -> Result<Fingerprint>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            fingerprints: Mutex::new(HashMap::new()),
            hasher: fingerprint_file,
        }
    }

    pub fn build_queries(&self, path: &Path, language: &str, guess: &Guess) -> Result<Vec<SearchQuery>> {
        let text_query = guess_query(path, guess, language)?;
        let (fingerprint, size) = self.fingerprint(path)?;
        Ok(vec![text_query, hash_query(&fingerprint, size, language)])
    }

    fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let slot = relock(&self.fingerprints)
            .entry(path.to_path_buf())
            .or_default()
            .clone();

        let mut slot = relock(&slot);
        if let Some(cached) = &*slot {
            return Ok(cached.clone());
        }

        let computed = (self.hasher)(path)?;
        debug!("Fingerprint of {path:?} is {}", computed.0);
        *slot = Some(computed.clone());
        Ok(computed)
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let fingerprint = hash::fingerprint_hex(path)?;
    let size = fs::metadata(path)?.len();
    Ok((fingerprint, size))
}

// a poisoned lock only means another worker panicked while holding it
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Free-text query assembled from the classifier's guess.
pub fn guess_query(path: &Path, guess: &Guess, language: &str) -> Result<SearchQuery> {
    let mut query = SearchQuery::new();

    match guess.kind {
        Some(MediaKind::Episode) => {
            let text = quoted(&[
                guess.title.as_deref(),
                guess.episode_title.as_deref(),
                guess.release_group.as_deref(),
            ]);
            query = query.with_text("query", text);
            if let Some(season) = guess.season {
                query = query.with_int("season", season.into());
            }
            if let Some(episode) = guess.episode {
                query = query.with_int("episode", episode.into());
            }
        }
        Some(MediaKind::Movie) => {
            let year = guess.year.map(|y| y.to_string());
            let text = quoted(&[guess.title.as_deref(), year.as_deref()]);
            query = query.with_text("query", text);
        }
        None => {
            return Err(SubtitleError::Classification(
                path.to_string_lossy().into_owned(),
            ))
        }
    }

    Ok(query.with_text("sublanguageid", language))
}

pub fn hash_query(fingerprint: &str, size: u64, language: &str) -> SearchQuery {
    SearchQuery::new()
        .with_text("moviehash", fingerprint)
        .with_text("moviebytesize", size.to_string())
        .with_text("sublanguageid", language)
}

fn quoted(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
