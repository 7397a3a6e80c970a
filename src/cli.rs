use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "subfetch", version)]
#[command(about = "Searches for subtitles using OpenSubtitles (http://www.opensubtitles.org)")]
#[command(
    after_help = "If a directory is given, search for subtitles for all movies on it (non-recursively)."
)]
pub struct Cli {
    /// Video files or directories to search subtitles for
    pub inputs: Vec<PathBuf>,

    /// Always display the configuration and enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
