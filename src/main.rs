mod cli;
mod config;
mod domain;
mod error;
mod infra;
mod media;
mod search;
mod workflows;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::{self, Write};

use cli::Cli;
use infra::download::HttpDownloader;
use infra::opensubtitles::OpenSubtitlesRpc;
use media::merge::MkvMerge;
use search::classifier::FilenameClassifier;
use search::client::{Credentials, SearchClient};
use workflows::orchestrator::Orchestrator;

/// Exit code when no inputs were given.
const USAGE_ERROR: i32 = 2;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = config::get_config_path();
    let configuration = config::load_configuration(&config_path)?;
    let mut stdout = io::stdout().lock();

    if cli.verbose {
        writeln!(stdout, "Configuration read from {}", config_path.display())?;
        writeln!(stdout, "{configuration}")?;
        writeln!(stdout)?;
    }

    if cli.inputs.is_empty() {
        Cli::command().print_help()?;
        return Ok(USAGE_ERROR);
    }

    let search = SearchClient::new(
        Box::new(OpenSubtitlesRpc::new()),
        Box::new(FilenameClassifier::new()?),
        Credentials::from_env(),
    );
    let downloader = HttpDownloader::new();
    let merger = MkvMerge::new();

    let outcome = Orchestrator::new(&configuration, &search, &downloader, &merger)
        .run(&cli.inputs, &mut stdout)?;

    Ok(outcome.exit_code())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_filter = if verbose { "subfetch=debug" } else { "subfetch=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
