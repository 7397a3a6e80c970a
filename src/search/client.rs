use std::path::Path;

use tracing::{debug, warn};

use super::classifier::Classifier;
use super::query::QueryBuilder;
use super::ranker::{self, QueryContext};
use crate::domain::models::{RankedMatch, SearchQuery, SearchResult};
use crate::error::Result;

/// The remote subtitle database.
pub trait RemoteService: Send + Sync {
    fn log_in(&self, username: &str, password: &str, locale: &str, agent: &str) -> Result<String>;
    fn search_subtitles(&self, token: &str, queries: &[SearchQuery]) -> Result<Vec<SearchResult>>;
    fn log_out(&self, token: &str) -> Result<()>;
}

/// Finds the best subtitle for one (file, language) pair.
pub trait SubtitleSearch: Send + Sync {
    fn search(&self, video: &Path, language: &str) -> Result<Option<RankedMatch>>;
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Anonymous unless `OPENSUBTITLES_USERNAME`/`OPENSUBTITLES_PASSWORD`
    /// are set.
    pub fn from_env() -> Self {
        Self {
            username: std::env::var("OPENSUBTITLES_USERNAME").unwrap_or_default(),
            password: std::env::var("OPENSUBTITLES_PASSWORD").unwrap_or_default(),
        }
    }
}

pub struct SearchClient {
    remote: Box<dyn RemoteService>,
    classifier: Box<dyn Classifier>,
    queries: QueryBuilder,
    credentials: Credentials,
    user_agent: String,
}

impl SearchClient {
    pub fn new(
        remote: Box<dyn RemoteService>,
        classifier: Box<dyn Classifier>,
        credentials: Credentials,
    ) -> Self {
        Self {
            remote,
            classifier,
            queries: QueryBuilder::new(),
            credentials,
            user_agent: format!("subfetch v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SubtitleSearch for SearchClient {
    fn search(&self, video: &Path, language: &str) -> Result<Option<RankedMatch>> {
        let session = Session::open(self.remote.as_ref(), &self.credentials, &self.user_agent)?;

        let basename = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let guess = self.classifier.classify(&basename)?;
        let queries = self.queries.build_queries(video, language, &guess)?;

        let results = self.remote.search_subtitles(session.token(), &queries)?;
        debug!(
            "{} results for {basename} ({})",
            results.len(),
            queries[0].language().unwrap_or(language)
        );

        // season/episode as sent to the service, not as guessed
        let expected = |key: &str| queries[0].get_int(key).and_then(|n| u32::try_from(n).ok());
        let context = QueryContext {
            basename: &basename,
            season: expected("season"),
            episode: expected("episode"),
        };
        Ok(ranker::select_best(&results, &context))
    }
}

/// A logged-in session; the token is released when this is dropped.
struct Session<'a> {
    remote: &'a dyn RemoteService,
    token: String,
}

impl<'a> Session<'a> {
    fn open(remote: &'a dyn RemoteService, credentials: &Credentials, agent: &str) -> Result<Self> {
        let token = remote.log_in(&credentials.username, &credentials.password, "en", agent)?;
        Ok(Self { remote, token })
    }

    fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.remote.log_out(&self.token) {
            warn!("Failed to log out of subtitle service: {e}");
        }
    }
}
