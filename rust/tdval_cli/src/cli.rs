use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file (defaults are used when missing)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the CSV of search engine hits (will over-write the config file)
    #[arg(short = 'i', long)]
    pub hits_file: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Calibrate the search engines in parallel
    #[arg(short, long)]
    pub parallel: bool,
}
