use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use voxsync::app::{run_align, run_resolve};
use voxsync::cli::{Cli, Commands, ConfigAction};
use voxsync::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli, &config);
    tracing::debug!(version = %voxsync::version_string(), "voxsync starting");

    match cli.command {
        Commands::Align { file } => {
            config.validate()?;
            let input = open_input(&file)?;
            let report = run_align(&config.languages.targets, input, io::stdout().lock())?;
            tracing::info!(
                chunks = report.chunks,
                segments = report.segments,
                rejected = report.rejected,
                "align finished"
            );
        }
        Commands::Resolve { file, lang } => {
            let input = open_input(&file)?;
            let report = run_resolve(lang.as_deref(), input, io::stdout().lock())?;
            tracing::info!(
                chunks = report.chunks,
                written = report.written,
                stale = report.stale,
                "resolve finished"
            );
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml()?),
            ConfigAction::Path => {
                let path = cli.config.clone().unwrap_or_else(Config::default_path);
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

/// Load configuration with proper precedence: file → env vars.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };
    Ok(config.with_env_overrides())
}

/// `RUST_LOG` wins over `-q`/`-v`, which win over `log.filter`.
fn init_logging(cli: &Cli, config: &Config) {
    let fallback = cli
        .log_filter_override()
        .unwrap_or(config.log.filter.as_str());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}
