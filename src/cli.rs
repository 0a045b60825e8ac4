//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use collector_core::config::DEFAULT_CREDENTIALS_FILE;
use collector_core::{DEFAULT_MAX_FILE_SIZE, QueryParameters};

/// Connect to a record stream and write its records to rotating gzip files.
#[derive(Parser, Debug)]
#[command(name = "collector")]
#[command(author, version, about)]
pub struct Args {
    /// Folder receiving tweets-<N>.jsonl.gz files (created if missing)
    pub output_path: PathBuf,

    /// Query-string parameters to pass when connecting (e.g. "tweet.fields=created_at&expansions=author_id")
    #[arg(short, long, value_parser = parse_parameters)]
    pub parameters: Option<QueryParameters>,

    /// YAML file mapping credential names to values
    #[arg(short = 'c', long = "credentials-file", default_value = DEFAULT_CREDENTIALS_FILE)]
    pub credentials: PathBuf,

    /// Maximum output file size in bytes before rotating (defaults to 1 GiB)
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_file_size: u64,

    /// Logging level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value_t = LogLevel::Warning, ignore_case = true)]
    pub log_level: LogLevel,
}

/// Log levels accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Returns the matching `tracing` filter directive.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            // tracing has no level above error.
            Self::Error | Self::Critical => "error",
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn parse_parameters(raw: &str) -> Result<QueryParameters, String> {
    Ok(QueryParameters::parse(raw))
}
