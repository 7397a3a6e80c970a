use regex::Regex;

use crate::domain::models::{Guess, MediaKind};
use crate::error::{Result, SubtitleError};

/// Turns a filename into structured metadata.
pub trait Classifier: Send + Sync {
    fn classify(&self, basename: &str) -> Result<Guess>;
}

/// Regex based classifier for scene-style release names such as
/// `Show.Name.S05E13.HDTV.x264-GROUP.avi` or `Movie (2011) BDRip-GROUP.avi`.
pub struct FilenameClassifier {
    separators: Regex,
    group: Regex,
    season_episode: Regex,
    attached_season_episode: Regex,
    cross: Regex,
    season_only: Regex,
    episode_only: Regex,
    year: Regex,
    release_tag: Regex,
}

impl FilenameClassifier {
    pub fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            separators: Regex::new(r"[\s._()\[\]]+")?,
            group: Regex::new(r"-([A-Za-z0-9]+)$")?,
            season_episode: Regex::new(r"(?i)^s(\d{1,2})e(\d{1,3})$")?,
            attached_season_episode: Regex::new(r"(?i)^(.+?)s(\d{1,2})e(\d{1,3})$")?,
            cross: Regex::new(r"^(\d{1,2})x(\d{2,3})$")?,
            season_only: Regex::new(r"(?i)^s(\d{1,2})$")?,
            episode_only: Regex::new(r"(?i)^e(\d{1,3})$")?,
            year: Regex::new(r"^(?:19|20)\d{2}$")?,
            release_tag: Regex::new(
                r"(?i)^(?:hdtv|pdtv|proper|repack|internal|limited|x26[45]|h26[45]|hevc|xvid|divx|[bh]drip|brrip|dvdrip|webrip|web|web-?dl|bluray|dvdscr|\d{3,4}p|aac|ac3|dts)$",
            )?,
        })
    }

    fn episode_marker(&self, token: &str) -> Option<EpisodeMarker> {
        if let Some(caps) = self.season_episode.captures(token) {
            return Some(EpisodeMarker {
                prefix: None,
                season: caps[1].parse().ok(),
                episode: caps[2].parse().ok(),
            });
        }
        if let Some(caps) = self.cross.captures(token) {
            return Some(EpisodeMarker {
                prefix: None,
                season: caps[1].parse().ok(),
                episode: caps[2].parse().ok(),
            });
        }
        if let Some(caps) = self.season_only.captures(token) {
            return Some(EpisodeMarker {
                prefix: None,
                season: caps[1].parse().ok(),
                episode: None,
            });
        }
        if let Some(caps) = self.episode_only.captures(token) {
            return Some(EpisodeMarker {
                prefix: None,
                season: None,
                episode: caps[1].parse().ok(),
            });
        }
        if let Some(caps) = self.attached_season_episode.captures(token) {
            return Some(EpisodeMarker {
                prefix: Some(caps[1].to_string()),
                season: caps[2].parse().ok(),
                episode: caps[3].parse().ok(),
            });
        }
        None
    }

    fn until_release_tag<'a>(&self, tokens: &[&'a str]) -> Vec<&'a str> {
        tokens
            .iter()
            .take_while(|token| !self.release_tag.is_match(token))
            .copied()
            .collect()
    }
}

struct EpisodeMarker {
    prefix: Option<String>,
    season: Option<u32>,
    episode: Option<u32>,
}

impl Classifier for FilenameClassifier {
    fn classify(&self, basename: &str) -> Result<Guess> {
        let stem = std::path::Path::new(basename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(basename);

        let (rest, release_group) = match self.group.captures(stem) {
            Some(caps) => {
                let whole = caps.get(0).map(|m| m.start()).unwrap_or(stem.len());
                (&stem[..whole], Some(caps[1].to_string()))
            }
            None => (stem, None),
        };

        let tokens: Vec<&str> = self
            .separators
            .split(rest)
            .filter(|t| !t.is_empty())
            .collect();

        let mut guess = Guess {
            release_group,
            ..Guess::default()
        };

        let marker = tokens
            .iter()
            .enumerate()
            .find_map(|(i, token)| self.episode_marker(token).map(|m| (i, m)));

        if let Some((index, marker)) = marker {
            let mut title: Vec<&str> = tokens[..index].to_vec();
            if let Some(prefix) = marker.prefix.as_deref() {
                title.push(prefix);
            }
            let episode_title = self.until_release_tag(&tokens[index + 1..]);

            guess.kind = Some(MediaKind::Episode);
            guess.title = non_empty(title.join(" "));
            guess.episode_title = non_empty(episode_title.join(" "));
            guess.season = marker.season;
            guess.episode = marker.episode;
        } else if let Some(index) = tokens
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, token)| self.year.is_match(token))
            .map(|(i, _)| i)
        {
            guess.kind = Some(MediaKind::Movie);
            guess.title = non_empty(tokens[..index].join(" "));
            guess.year = tokens[index].parse().ok();
        } else {
            guess.kind = Some(MediaKind::Movie);
            guess.title = non_empty(self.until_release_tag(&tokens).join(" "));
        }

        if guess.title.is_none() {
            return Err(SubtitleError::Classification(basename.to_string()));
        }

        Ok(guess)
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
