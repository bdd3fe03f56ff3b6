//! Command-line interface for voxsync
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Replay and align revisioned speech chunks
#[derive(Parser, Debug)]
#[command(
    name = "voxsync",
    version = crate::version_string(),
    about = "Align revisioned speech chunks across languages"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSONL file of speech chunks through the jitter buffer and
    /// print each segment once every target language has finalized it
    Align {
        /// JSONL file, one speech chunk per line (`-` for stdin)
        file: PathBuf,
    },

    /// Replay speech chunks through one revision resolver per language and
    /// print the resolved chunks in timestamp order
    Resolve {
        /// JSONL file, one speech chunk per line (`-` for stdin)
        file: PathBuf,

        /// Only resolve this language
        #[arg(long, value_name = "LANG")]
        lang: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment overrides)
    Show,
    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Log filter implied by `-q` / `-v`, if any. Overrides the configured one.
    pub fn log_filter_override(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
