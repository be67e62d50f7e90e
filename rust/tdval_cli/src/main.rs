mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::{
    Config,
    InputConfig,
    OutputConfig,
};

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    // Parse command line arguments
    let args = Cli::parse();

    // Load and parse configuration
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Override config with command line arguments if provided
    if let Some(hits_file) = args.hits_file {
        config.input = Some(InputConfig::Csv { path: hits_file });
    }
    if let Some(output_dir) = args.output_dir {
        config.output = Some(OutputConfig {
            directory: output_dir,
        });
    }
    if args.parallel {
        config.analysis.parallel = true;
    }

    let input_path = match config.input {
        Some(InputConfig::Csv { ref path }) => path.clone(),
        None => {
            return Err(errors::CliError::Config {
                source: "No input provided, please provide one in either the config file or with the --hits-file flag".to_string(),
            });
        }
    };
    let output_config = match config.output {
        Some(ref x) => x.clone(),
        None => {
            return Err(errors::CliError::Config {
                source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            });
        }
    };
    info!("Parsed configuration: {:#?}", config);

    std::fs::create_dir_all(&output_config.directory)
        .map_err(|e| errors::CliError::io(e, &output_config.directory))?;

    let hits = processing::read_hits(&input_path)?;
    processing::run(hits, &config.analysis, &output_config)?;

    Ok(())
}
