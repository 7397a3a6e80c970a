use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use super::report::{print_header, print_status};
use super::{naming, pool};
use crate::config::Configuration;
use crate::domain::models::DownloadTask;
use crate::error::SubtitleError;
use crate::infra::download::{self, Downloader};
use crate::media::discover;
use crate::media::merge::Merger;
use crate::search::client::SubtitleSearch;

/// How a run ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    NoInputFiles,
    MergeToolMissing,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::NoInputFiles => 1,
            RunOutcome::MergeToolMissing => 4,
        }
    }
}

enum UnitOutcome {
    Downloaded(PathBuf),
    NotFound,
    Failed(SubtitleError),
    Cancelled,
}

/// Drives one invocation: discover, skip-check, search+download, merge.
pub struct Orchestrator<'a> {
    config: &'a Configuration,
    search: &'a dyn SubtitleSearch,
    downloader: &'a dyn Downloader,
    merger: &'a dyn Merger,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Configuration,
        search: &'a dyn SubtitleSearch,
        downloader: &'a dyn Downloader,
        merger: &'a dyn Merger,
    ) -> Self {
        Self {
            config,
            search,
            downloader,
            merger,
        }
    }

    pub fn run(&self, inputs: &[PathBuf], out: &mut dyn Write) -> Result<RunOutcome> {
        let files = discover::find_movie_files(inputs, self.config.recursive)?;
        if files.is_empty() {
            writeln!(out, "No files to search subtitles for. Aborting.")?;
            return Ok(RunOutcome::NoInputFiles);
        }
        debug!("Found {} video file(s)", files.len());

        if self.config.mkv && !self.merger.is_available() {
            writeln!(out, "mkvmerge not found in PATH.")?;
            writeln!(
                out,
                "Either install mkvtoolnix or disable mkv merging in your config."
            )?;
            return Ok(RunOutcome::MergeToolMissing);
        }

        writeln!(out, "Languages: {}", self.config.languages.join(", "))?;
        writeln!(out)?;

        let multi = self.config.is_multi_language();
        let to_skip = self.skip_set(&files, multi);
        if !to_skip.is_empty() {
            writeln!(out, "Skipping {} subtitles.", to_skip.len())?;
        }

        let tasks: Vec<DownloadTask> = files
            .iter()
            .flat_map(|file| {
                self.config
                    .languages
                    .iter()
                    .map(move |language| DownloadTask::new(file, language))
            })
            .collect::<BTreeSet<_>>()
            .difference(&to_skip)
            .cloned()
            .collect();

        if tasks.is_empty() {
            return Ok(RunOutcome::Completed);
        }

        print_header(out, "Downloading")?;

        let pool = pool::build_pool(self.config.parallel_jobs)?;
        let matches = self.download_all(&pool, &tasks, multi, out)?;

        if self.config.mkv {
            self.merge_all(&pool, matches, out)?;
        }

        Ok(RunOutcome::Completed)
    }

    fn skip_set(&self, files: &[PathBuf], multi: bool) -> BTreeSet<DownloadTask> {
        if !self.config.skip {
            return BTreeSet::new();
        }

        files
            .iter()
            .flat_map(|file| {
                self.config
                    .languages
                    .iter()
                    .filter(move |language| naming::has_subtitle(file, language, multi))
                    .map(move |language| DownloadTask::new(file, language))
            })
            .collect()
    }

    /// Searches and downloads every task; returns the subtitles written.
    fn download_all(
        &self,
        pool: &ThreadPool,
        tasks: &[DownloadTask],
        multi: bool,
        out: &mut dyn Write,
    ) -> Result<Vec<(DownloadTask, PathBuf)>> {
        let aborted = AtomicBool::new(false);
        let mut matches = Vec::new();
        let mut fatal: Option<SubtitleError> = None;

        pool::run_to_completion(
            pool,
            tasks,
            |task| self.search_and_download(task, multi, &aborted),
            |task, outcome| {
                let status = match outcome {
                    UnitOutcome::Downloaded(path) => {
                        matches.push((task.clone(), path));
                        "[OK]".to_string()
                    }
                    UnitOutcome::NotFound => "No matches found.".to_string(),
                    UnitOutcome::Failed(e) => {
                        warn!("{:?} ({}): {e}", task.video, task.language);
                        let status = format!("[ERROR] {e}");
                        if e.is_fatal() {
                            fatal.get_or_insert(e);
                        }
                        status
                    }
                    UnitOutcome::Cancelled => "[ERROR] cancelled".to_string(),
                };
                let text = format!(" - {} ({})", task.basename(), task.language);
                print_status(out, &text, &status)?;
                Ok(())
            },
        )?;

        if let Some(e) = fatal {
            return Err(e.into());
        }
        Ok(matches)
    }

    fn search_and_download(&self, task: &DownloadTask, multi: bool, aborted: &AtomicBool) -> UnitOutcome {
        if aborted.load(Ordering::Acquire) {
            return UnitOutcome::Cancelled;
        }

        let found = match self.search.search(&task.video, &task.language) {
            Ok(Some(found)) => found,
            Ok(None) => return UnitOutcome::NotFound,
            Err(e) => {
                if e.is_fatal() {
                    aborted.store(true, Ordering::Release);
                }
                return UnitOutcome::Failed(e);
            }
        };

        let target = naming::subtitle_path(&task.video, &task.language, &found.extension, multi);
        match download::download_subtitle(self.downloader, &found.download_link, &target) {
            Ok(()) => {
                info!("Downloaded {target:?}");
                UnitOutcome::Downloaded(target)
            }
            Err(e) => UnitOutcome::Failed(e),
        }
    }

    fn merge_all(
        &self,
        pool: &ThreadPool,
        matches: Vec<(DownloadTask, PathBuf)>,
        out: &mut dyn Write,
    ) -> Result<()> {
        writeln!(out)?;
        print_header(out, "Embedding MKV...")?;

        let mut to_embed: BTreeMap<PathBuf, Vec<(String, PathBuf)>> = BTreeMap::new();
        for (task, subtitle) in matches {
            to_embed
                .entry(task.video)
                .or_default()
                .push((task.language, subtitle));
        }

        let mut jobs = Vec::new();
        for (video, mut subtitles) in to_embed {
            subtitles.sort();
            let target = naming::merge_target(&video);
            if naming::is_merge_format(&video) || target.exists() {
                print_status(out, &merge_label(&target), "skipped")?;
            } else {
                jobs.push((video, subtitles));
            }
        }

        let mut failures: Vec<(PathBuf, String)> = Vec::new();
        pool::run_to_completion(
            pool,
            &jobs,
            |(video, subtitles)| self.merger.merge(video, subtitles),
            |(video, _), result| {
                let status = match result {
                    Ok(()) => "DONE",
                    Err(e) => {
                        let output = match e {
                            SubtitleError::MergeFailure { output } => output,
                            other => other.to_string(),
                        };
                        failures.push((video.clone(), output));
                        "ERROR"
                    }
                };
                print_status(out, &merge_label(&naming::merge_target(video)), status)?;
                Ok(())
            },
        )?;

        if !failures.is_empty() {
            writeln!(out, "{}", "_".repeat(80))?;
            for (video, output) in failures {
                writeln!(out, ":{}:", video.display())?;
                writeln!(out, "{output}")?;
            }
        }

        Ok(())
    }
}

fn merge_label(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(" - {name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RankedMatch, SearchQuery, SearchResult};
    use crate::error::Result as SubtitleResult;
    use crate::search::classifier::FilenameClassifier;
    use crate::search::client::{Credentials, RemoteService, SearchClient};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use regex::Regex;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers searches from a registry of (video name, language) pairs.
    #[derive(Default)]
    struct FakeSearch {
        subtitles: Mutex<HashSet<(String, String)>>,
        calls: Mutex<Vec<(String, String)>>,
        fail_with_auth: bool,
    }

    impl SubtitleSearch for FakeSearch {
        fn search(&self, video: &Path, language: &str) -> SubtitleResult<Option<RankedMatch>> {
            let name = video.file_name().unwrap().to_string_lossy().into_owned();
            self.calls
                .lock()
                .unwrap()
                .push((name.clone(), language.to_string()));
            if self.fail_with_auth {
                return Err(SubtitleError::Authentication("401 Unauthorized".to_string()));
            }
            let known = self
                .subtitles
                .lock()
                .unwrap()
                .contains(&(name, language.to_string()));
            Ok(known.then(|| RankedMatch {
                download_link: format!("http://fake/{language}.gz"),
                extension: ".srt".to_string(),
            }))
        }
    }

    struct FakeDownloader {
        broken: Option<String>,
    }

    impl Downloader for FakeDownloader {
        fn fetch(&self, url: &str) -> SubtitleResult<Vec<u8>> {
            if self.broken.as_deref() == Some(url) {
                return Err(SubtitleError::Download("connection reset".to_string()));
            }
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"downloaded")?;
            Ok(encoder.finish()?)
        }
    }

    struct FakeMerger {
        available: bool,
        failure: Option<String>,
        calls: Mutex<Vec<(PathBuf, Vec<(String, PathBuf)>)>>,
    }

    impl Merger for FakeMerger {
        fn is_available(&self) -> bool {
            self.available
        }

        fn merge(&self, video: &Path, subtitles: &[(String, PathBuf)]) -> SubtitleResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push((video.to_path_buf(), subtitles.to_vec()));
            if let Some(output) = &self.failure {
                return Err(SubtitleError::MergeFailure {
                    output: output.clone(),
                });
            }
            for (_, subtitle) in subtitles {
                assert!(subtitle.is_file(), "{subtitle:?} not found");
            }
            fs::write(naming::merge_target(video), b"")?;
            Ok(())
        }
    }

    struct Runner {
        dir: TempDir,
        configuration: Configuration,
        search: FakeSearch,
        downloader: FakeDownloader,
        merger: FakeMerger,
        output: String,
    }

    impl Runner {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                configuration: Configuration::default(),
                search: FakeSearch::default(),
                downloader: FakeDownloader { broken: None },
                merger: FakeMerger {
                    available: true,
                    failure: None,
                    calls: Mutex::new(Vec::new()),
                },
                output: String::new(),
            }
        }

        fn root(&self) -> PathBuf {
            fs::canonicalize(self.dir.path()).unwrap()
        }

        fn register(&self, movie: &str, languages: &[&str]) {
            fs::write(self.root().join(movie), b"").unwrap();
            let mut subtitles = self.search.subtitles.lock().unwrap();
            for language in languages {
                subtitles.insert((movie.to_string(), language.to_string()));
            }
        }

        fn run(&mut self, inputs: &[&str]) -> Result<RunOutcome> {
            let inputs: Vec<PathBuf> = inputs.iter().map(|name| self.root().join(name)).collect();
            let mut out = Vec::new();
            let orchestrator = Orchestrator::new(
                &self.configuration,
                &self.search,
                &self.downloader,
                &self.merger,
            );
            let result = orchestrator.run(&inputs, &mut out);
            self.output = String::from_utf8(out).unwrap();
            result
        }

        fn check_files(&self, expected: &[&str]) {
            let found: BTreeSet<String> = fs::read_dir(self.root())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            let expected: BTreeSet<String> = expected.iter().map(|s| s.to_string()).collect();
            assert_eq!(found, expected, "output:\n{}", self.output);
        }

        fn check_output_matches(&self, pattern: &str) {
            let re = Regex::new(pattern).unwrap();
            assert!(
                re.is_match(&self.output),
                "Could not find regex {pattern:?} in output:\n{}",
                self.output
            );
        }
    }

    #[test]
    fn test_normal_execution() {
        let mut runner = Runner::new();
        runner.register("serieS01E01.avi", &["eng"]);

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_files(&["serieS01E01.avi", "serieS01E01.srt"]);
        assert!(runner.output.contains("Downloading"));
        runner.check_output_matches(r" - serieS01E01.avi \(eng\)\s+\[OK\]");
        assert_eq!(
            fs::read(runner.root().join("serieS01E01.srt")).unwrap(),
            b"downloaded"
        );
    }

    #[test]
    fn test_skipping() {
        let cases: &[(&[&str], &[&str], usize)] = &[
            (&["movie.srt"], &["eng"], 1),
            (&["movie.srt"], &["eng", "pob"], 0),
            (&["movie.eng.srt"], &["eng", "pob"], 1),
            (&["movie.eng.srt", "movie.pob.srt"], &["eng", "pob"], 2),
        ];

        for (subtitle_files, languages, skip_count) in cases {
            let mut runner = Runner::new();
            runner.register("movie.avi", languages);
            for subtitle_file in subtitle_files.iter() {
                fs::write(runner.root().join(subtitle_file), "untouched").unwrap();
            }
            runner.configuration.skip = true;
            runner.configuration.languages = languages.iter().map(|s| s.to_string()).collect();

            assert_eq!(runner.run(&["movie.avi"]).unwrap(), RunOutcome::Completed);

            let mut expected: Vec<String> = vec!["movie.avi".to_string()];
            expected.extend(subtitle_files.iter().map(|s| s.to_string()));
            if languages.len() > 1 {
                expected.extend(languages.iter().map(|l| format!("movie.{l}.srt")));
            }
            let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
            runner.check_files(&expected);

            for subtitle_file in subtitle_files.iter() {
                assert_eq!(
                    fs::read_to_string(runner.root().join(subtitle_file)).unwrap(),
                    "untouched"
                );
            }
            assert_eq!(
                runner.search.calls.lock().unwrap().len(),
                languages.len() - skip_count
            );
            if *skip_count > 0 {
                assert!(runner
                    .output
                    .contains(&format!("Skipping {skip_count} subtitles.")));
            } else {
                assert!(!runner.output.contains("Skipping"));
            }
        }
    }

    #[test]
    fn test_mkv() {
        let mut runner = Runner::new();
        runner.register("serieS01E01.avi", &["pob", "eng"]);
        runner.configuration.mkv = true;
        runner.configuration.languages = vec!["pob".to_string(), "eng".to_string()];

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);

        let root = runner.root();
        let calls = runner.merger.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                root.join("serieS01E01.avi"),
                vec![
                    ("eng".to_string(), root.join("serieS01E01.eng.srt")),
                    ("pob".to_string(), root.join("serieS01E01.pob.srt")),
                ],
            )]
        );
        assert!(runner.output.contains("Embedding MKV..."));
        runner.check_files(&[
            "serieS01E01.avi",
            "serieS01E01.pob.srt",
            "serieS01E01.eng.srt",
            "serieS01E01.mkv",
        ]);
    }

    #[test]
    fn test_missing_mkv() {
        let mut runner = Runner::new();
        runner.register("serieS01E01.avi", &["eng"]);
        runner.configuration.mkv = true;
        runner.merger.available = false;

        assert_eq!(
            runner.run(&["serieS01E01.avi"]).unwrap(),
            RunOutcome::MergeToolMissing
        );
        assert_eq!(RunOutcome::MergeToolMissing.exit_code(), 4);
        assert!(runner.output.contains("mkvmerge not found in PATH"));
        assert!(runner.search.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mkv_error() {
        let mut runner = Runner::new();
        runner.register("movie.avi", &["eng"]);
        runner.configuration.mkv = true;
        runner.merger.failure = Some("error calling mkvmerge".to_string());

        assert_eq!(runner.run(&["movie.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_output_matches(r" - movie.mkv\s+ERROR");
        runner.check_output_matches(&format!("{}\n:.*movie.avi:", "_".repeat(80)));
        runner.check_output_matches("error calling mkvmerge");
    }

    #[test]
    fn test_multiple_languages() {
        let mut runner = Runner::new();
        runner.register("serieS01E01.avi", &["eng", "pb"]);
        runner.configuration.languages = vec!["eng".to_string(), "pb".to_string()];

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_files(&["serieS01E01.avi", "serieS01E01.eng.srt", "serieS01E01.pb.srt"]);
    }

    #[test]
    fn test_multiple_languages_partial_match() {
        let mut runner = Runner::new();
        runner.register("serieS01E01.avi", &["eng"]);
        runner.configuration.languages = vec!["eng".to_string(), "pob".to_string()];

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_files(&["serieS01E01.avi", "serieS01E01.eng.srt"]);
        runner.check_output_matches(r" - serieS01E01.avi \(eng\)\s+\[OK\]");
        runner.check_output_matches(r" - serieS01E01.avi \(pob\)\s+No matches found\.");
    }

    #[test]
    fn test_mkv_with_subtitles_already_inplace() {
        let mut runner = Runner::new();
        fs::write(runner.root().join("serieS01E01.srt"), b"").unwrap();
        runner.register("serieS01E01.avi", &["eng"]);
        runner.configuration.mkv = true;

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_output_matches(r" - serieS01E01.mkv\s+DONE");
        runner.check_files(&["serieS01E01.avi", "serieS01E01.srt", "serieS01E01.mkv"]);

        assert_eq!(runner.run(&["serieS01E01.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_output_matches(r" - serieS01E01.mkv\s+skipped");
        assert_eq!(runner.merger.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_mkv_input_is_not_merged() {
        let mut runner = Runner::new();
        runner.register("movie.mkv", &["eng"]);
        runner.configuration.mkv = true;

        assert_eq!(runner.run(&["movie.mkv"]).unwrap(), RunOutcome::Completed);
        runner.check_output_matches(r" - movie.mkv\s+skipped");
        assert!(runner.merger.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_matches() {
        let mut runner = Runner::new();
        runner.register("movie.avi", &[]);

        assert_eq!(runner.run(&["movie.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_output_matches(r" - movie.avi \(eng\)\s+No matches found\.");
        runner.check_files(&["movie.avi"]);
    }

    #[test]
    fn test_no_input_files() {
        let mut runner = Runner::new();

        assert_eq!(runner.run(&[""]).unwrap(), RunOutcome::NoInputFiles);
        assert_eq!(RunOutcome::NoInputFiles.exit_code(), 1);
        runner.check_output_matches("No files to search subtitles for. Aborting.");
    }

    #[test]
    fn test_directory_input() {
        let mut runner = Runner::new();
        runner.register("a.avi", &["eng"]);
        runner.register("b.mp4", &["eng"]);
        fs::write(runner.root().join("notes.txt"), b"").unwrap();

        assert_eq!(runner.run(&[""]).unwrap(), RunOutcome::Completed);
        runner.check_files(&["a.avi", "a.srt", "b.mp4", "b.srt", "notes.txt"]);
    }

    #[test]
    fn test_download_failure_does_not_abort_batch() {
        let mut runner = Runner::new();
        runner.register("movie.avi", &["eng", "pob"]);
        runner.configuration.languages = vec!["eng".to_string(), "pob".to_string()];
        runner.downloader.broken = Some("http://fake/pob.gz".to_string());

        assert_eq!(runner.run(&["movie.avi"]).unwrap(), RunOutcome::Completed);
        runner.check_files(&["movie.avi", "movie.eng.srt"]);
        runner.check_output_matches(r" - movie.avi \(pob\)\s+\[ERROR\] Download failed");
    }

    #[test]
    fn test_authentication_failure_aborts_run() {
        let mut runner = Runner::new();
        runner.register("a.avi", &["eng"]);
        runner.register("b.avi", &["eng"]);
        runner.search.fail_with_auth = true;
        runner.configuration.parallel_jobs = 1;

        let err = runner.run(&["a.avi", "b.avi"]).unwrap_err();
        assert!(err.to_string().contains("Login"));
        assert_eq!(runner.output.matches("[ERROR]").count(), 2);
        runner.check_files(&["a.avi", "b.avi"]);
    }

    /// Subtitle service answering every search with the same records.
    struct FakeRemote {
        results: Vec<SearchResult>,
        malformed: bool,
    }

    impl RemoteService for FakeRemote {
        fn log_in(&self, _: &str, _: &str, _: &str, _: &str) -> SubtitleResult<String> {
            Ok("TOKEN".to_string())
        }

        fn search_subtitles(&self, _: &str, _: &[SearchQuery]) -> SubtitleResult<Vec<SearchResult>> {
            if self.malformed {
                return Err(SubtitleError::Protocol("\"data\" key not found".to_string()));
            }
            Ok(self.results.clone())
        }

        fn log_out(&self, _: &str) -> SubtitleResult<()> {
            Ok(())
        }
    }

    fn run_with_remote(
        dir: &Path,
        configuration: &Configuration,
        remote: FakeRemote,
        inputs: &[&str],
    ) -> (Result<RunOutcome>, String) {
        let search = SearchClient::new(
            Box::new(remote),
            Box::new(FilenameClassifier::new().unwrap()),
            Credentials::default(),
        );
        let downloader = FakeDownloader { broken: None };
        let merger = FakeMerger {
            available: true,
            failure: None,
            calls: Mutex::new(Vec::new()),
        };
        let inputs: Vec<PathBuf> = inputs.iter().map(|name| dir.join(name)).collect();
        let mut out = Vec::new();
        let result = Orchestrator::new(configuration, &search, &downloader, &merger).run(&inputs, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_per_file_errors_do_not_stop_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        fs::write(root.join("Drive (2011) BDRip.avi"), vec![0u8; 200_000]).unwrap();
        fs::write(root.join("Tiny (2011).avi"), b"short").unwrap();
        fs::write(root.join("S01E01.avi"), vec![0u8; 200_000]).unwrap();
        let remote = FakeRemote {
            results: vec![SearchResult {
                release_name: "Drive (2011) BDRip".to_string(),
                download_link: "http://fake/eng.gz".to_string(),
                format: "SRT".to_string(),
                download_count: 10,
                season: None,
                episode: None,
            }],
            malformed: false,
        };

        let (result, output) = run_with_remote(
            &root,
            &Configuration::default(),
            remote,
            &["Drive (2011) BDRip.avi", "Tiny (2011).avi", "S01E01.avi"],
        );

        assert_eq!(result.unwrap(), RunOutcome::Completed, "output:\n{output}");
        assert!(Regex::new(r" - Drive \(2011\) BDRip.avi \(eng\)\s+\[OK\]").unwrap().is_match(&output));
        assert!(Regex::new(r" - Tiny \(2011\).avi \(eng\)\s+\[ERROR\] .*must have at least").unwrap().is_match(&output));
        assert!(Regex::new(r" - S01E01.avi \(eng\)\s+\[ERROR\] Could not classify").unwrap().is_match(&output));
        assert_eq!(output.matches("[ERROR]").count(), 2);
        assert_eq!(fs::read(root.join("Drive (2011) BDRip.srt")).unwrap(), b"downloaded");
        assert!(!root.join("Tiny (2011).srt").exists());
        assert!(!root.join("S01E01.srt").exists());
    }

    #[test]
    fn test_malformed_service_response_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        fs::write(root.join("Alpha (2011).avi"), vec![0u8; 200_000]).unwrap();
        fs::write(root.join("Bravo (2011).avi"), vec![0u8; 200_000]).unwrap();
        let configuration = Configuration {
            parallel_jobs: 1,
            ..Configuration::default()
        };
        let remote = FakeRemote {
            results: Vec::new(),
            malformed: true,
        };

        let (result, output) = run_with_remote(
            &root,
            &configuration,
            remote,
            &["Alpha (2011).avi", "Bravo (2011).avi"],
        );

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubtitleError>(),
            Some(SubtitleError::Protocol(_))
        ));
        assert!(output.contains("[ERROR] Malformed response"), "output:\n{output}");
        assert!(output.contains("[ERROR] cancelled"), "output:\n{output}");
    }
}
