use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_PARALLEL_JOBS: usize = 8;

/// Settings for one invocation. Loaded once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Ordered; the first language is the primary one.
    pub languages: Vec<String>,
    pub recursive: bool,
    pub skip: bool,
    pub mkv: bool,
    pub parallel_jobs: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            recursive: false,
            skip: false,
            mkv: false,
            parallel_jobs: DEFAULT_PARALLEL_JOBS,
        }
    }
}

impl Configuration {
    pub fn is_multi_language(&self) -> bool {
        self.languages.len() > 1
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "languages = \"{}\"", self.languages.join(", "))?;
        writeln!(f, "recursive = {}", self.recursive)?;
        writeln!(f, "skip = {}", self.skip)?;
        writeln!(f, "mkv = {}", self.mkv)?;
        write!(f, "parallel_jobs = {}", self.parallel_jobs)
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    languages: Option<String>,
    recursive: Option<bool>,
    skip: Option<bool>,
    #[serde(alias = "merge")]
    mkv: Option<bool>,
    parallel_jobs: Option<usize>,
}

/// Reads the configuration at `path`; a missing file yields the defaults.
pub fn load_configuration(path: &Path) -> Result<Configuration> {
    let mut config = Configuration::default();
    if !path.exists() {
        return Ok(config);
    }

    let content = fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&content).with_context(|| {
        format!(
            "Invalid config file {path:?} (expected TOML, e.g. languages = \"eng, pob\" and recursive = true)"
        )
    })?;

    if let Some(languages) = file.languages {
        let mut parsed: Vec<String> = Vec::new();
        for language in languages.split(',').map(str::trim) {
            if !language.is_empty() && !parsed.iter().any(|l| l == language) {
                parsed.push(language.to_string());
            }
        }
        if !parsed.is_empty() {
            config.languages = parsed;
        }
    }
    if let Some(recursive) = file.recursive {
        config.recursive = recursive;
    }
    if let Some(skip) = file.skip {
        config.skip = skip;
    }
    if let Some(mkv) = file.mkv {
        config.mkv = mkv;
    }
    if let Some(jobs) = file.parallel_jobs {
        config.parallel_jobs = jobs.max(1);
    }

    Ok(config)
}

/// `SUBFETCH_CONFIG` if set, otherwise `config.toml` in the user config dir.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("SUBFETCH_CONFIG") {
        return PathBuf::from(path);
    }
    get_config_dir_path().join("config.toml")
}

fn get_config_dir_path() -> PathBuf {
    xdir::config()
        .map(|path| path.join("subfetch"))
        // If the standard path could not be found (e.g.`$HOME` is not set),
        // default to the current directory.
        .unwrap_or_default()
}
