use std::cmp::Ordering;

use similar::TextDiff;
use tracing::debug;

use crate::domain::models::{RankedMatch, SearchResult};

/// Minimum similarity ratio for a candidate to count as a close match.
pub const CLOSE_MATCH_CUTOFF: f32 = 0.6;

const STRIPPED_EXTENSIONS: &[&str] = &["avi", "mp4", "mpg", "mkv", "srt", "sub", "ssa", "smi", "mpl"];

/// What the ranker knows about the local file being matched.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub basename: &'a str,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Picks the single best subtitle for a query.
///
/// With both season and episode known, results reporting a different
/// season or episode are discarded and the service's own order decides.
/// Otherwise candidates are compared by name similarity against the local
/// file; only close matches are eligible, ordered by similarity and then
/// by download count.
pub fn select_best(results: &[SearchResult], context: &QueryContext<'_>) -> Option<RankedMatch> {
    match (context.season, context.episode) {
        (Some(season), Some(episode)) => exact_match(results, season, episode),
        _ => fuzzy_match(results, context.basename),
    }
    .map(RankedMatch::from)
}

fn exact_match(results: &[SearchResult], season: u32, episode: u32) -> Option<&SearchResult> {
    results
        .iter()
        .find(|r| r.season == Some(season) && r.episode == Some(episode))
}

fn fuzzy_match<'r>(results: &'r [SearchResult], basename: &str) -> Option<&'r SearchResult> {
    let target = normalize(basename);

    let mut close: Vec<(f32, &SearchResult)> = results
        .iter()
        .map(|r| (similarity(&target, &normalize(&r.release_name)), r))
        .filter(|(ratio, _)| *ratio >= CLOSE_MATCH_CUTOFF)
        .collect();

    close.sort_by(|(a_ratio, a), (b_ratio, b)| {
        b_ratio
            .partial_cmp(a_ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.download_count.cmp(&a.download_count))
    });

    if let Some((ratio, best)) = close.first() {
        debug!("Best close match for {basename:?} is {:?} ({ratio:.2})", best.release_name);
    }
    close.first().map(|(_, r)| *r)
}

pub fn similarity(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

fn normalize(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, ext)) if STRIPPED_EXTENSIONS.contains(&ext) => stem.to_string(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, link: &str, downloads: u64, season: Option<u32>, episode: Option<u32>) -> SearchResult {
        SearchResult {
            release_name: name.to_string(),
            download_link: link.to_string(),
            format: "srt".to_string(),
            download_count: downloads,
            season,
            episode,
        }
    }

    const PARKS: &str = "Parks.and.Recreation.S05E13.HDTV.x264-LOL.srt";

    #[test]
    fn test_exact_match_skips_wrong_season_and_episode() {
        let results = vec![
            result(PARKS, "http://sub99.srt", 1000, Some(4), Some(13)),
            result(PARKS, "http://sub98.srt", 1000, Some(5), Some(11)),
            result(PARKS, "http://sub1.srt", 1000, Some(5), Some(13)),
            result(PARKS, "http://sub2.srt", 1500, Some(5), Some(13)),
            result("Parks.and.Recreation.S05E13.HDTV.-LOL.srt", "http://sub3.srt", 9999, Some(5), Some(13)),
        ];
        let context = QueryContext {
            basename: "Parks.and.Recreation.S05E13.HDTV.x264-LOL.avi",
            season: Some(5),
            episode: Some(13),
        };

        let best = select_best(&results, &context).unwrap();
        assert_eq!(best.download_link, "http://sub1.srt");
        assert_eq!(best.extension, ".srt");
    }

    #[test]
    fn test_exact_match_never_selects_disagreeing_results() {
        let results = vec![
            result(PARKS, "http://wrong.srt", 1_000_000, Some(5), Some(12)),
            result(PARKS, "http://unknown.srt", 1_000_000, None, None),
        ];
        let context = QueryContext {
            basename: PARKS,
            season: Some(5),
            episode: Some(13),
        };
        assert_eq!(select_best(&results, &context), None);
    }

    #[test]
    fn test_fuzzy_no_close_candidates() {
        let results = vec![result("Completely Unrelated Film 1999", "http://a", 10, None, None)];
        let context = QueryContext {
            basename: "Drive.2011.BDRip.XviD-COCAIN.avi",
            season: None,
            episode: None,
        };
        assert_eq!(select_best(&results, &context), None);
    }

    #[test]
    fn test_fuzzy_tie_prefers_download_count() {
        let results = vec![
            result("Drive.2011.BDRip.XviD-COCAIN", "http://few", 10, None, None),
            result("Drive.2011.BDRip.XviD-COCAIN", "http://many", 500, None, None),
        ];
        let context = QueryContext {
            basename: "Drive.2011.BDRip.XviD-COCAIN.avi",
            season: None,
            episode: None,
        };
        assert_eq!(select_best(&results, &context).unwrap().download_link, "http://many");
    }

    #[test]
    fn test_fuzzy_closeness_beats_download_count() {
        let results = vec![
            result("Drive.2011.720p.BluRay-SPARKS", "http://popular", 9999, None, None),
            result("Drive.2011.BDRip.XviD-COCAIN", "http://exact", 1, None, None),
        ];
        let context = QueryContext {
            basename: "drive.2011.bdrip.xvid-cocain.avi",
            season: None,
            episode: None,
        };
        assert_eq!(select_best(&results, &context).unwrap().download_link, "http://exact");
    }

    #[test]
    fn test_partial_season_info_uses_fuzzy() {
        let results = vec![result(
            "The.IT.Crowd.S04.The.Last.Byte.PROPER.HDTV.x264-TLA",
            "http://tla",
            1,
            Some(4),
            None,
        )];
        let context = QueryContext {
            basename: "The.IT.Crowd.S04.The.Last.Byte.PROPER.HDTV.x264-TLA.mp4",
            season: Some(4),
            episode: None,
        };
        assert_eq!(select_best(&results, &context).unwrap().download_link, "http://tla");
    }

    #[test]
    fn test_similarity_is_case_insensitive_after_normalize() {
        assert_eq!(similarity(&normalize("MOVIE.avi"), &normalize("movie.srt")), 1.0);
    }
}
