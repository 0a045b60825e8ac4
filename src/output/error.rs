//! Error types for the output module.
//!
//! Every variant is fatal to the writer: local storage faults are never
//! retried, so a failing disk cannot silently drop records.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing records to rotated files.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The destination exists but is not a directory.
    #[error("output path {path} exists and is not a directory")]
    NotADirectory {
        /// The offending destination path.
        path: PathBuf,
    },

    /// The size threshold must be at least one byte.
    #[error("invalid max file size {value}: must be greater than 0")]
    InvalidMaxFileSize {
        /// The rejected value.
        value: u64,
    },

    /// File system error while listing, creating, or writing output files.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file or folder where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The record source failed with a non-retryable error.
    #[error("record source failed: {source}")]
    Upstream {
        /// The error yielded by the record stream.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl DriverError {
    /// Creates a not-a-directory error.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps an error yielded by the record stream.
    pub fn upstream<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Upstream {
            source: Box::new(source),
        }
    }
}
