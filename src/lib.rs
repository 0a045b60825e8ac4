//! Collector Core Library
//!
//! This library persists a long-lived HTTP record stream (one JSON document
//! per line) to size-rotated gzip files, reconnecting through transient
//! failures and resuming at the right file after a restart.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`stream`] - Authenticated streaming reader with ladder backoff
//! - [`output`] - Rotating gzip file driver and rotation naming
//! - [`config`] - Credentials file and run configuration
//! - [`pipeline`] - Reader-to-driver wiring with graceful shutdown

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod output;
pub mod pipeline;
pub mod stream;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use config::{CollectorConfig, ConfigError, Credentials};
pub use output::{DEFAULT_MAX_FILE_SIZE, DriverError, FileDriver, WriteSummary};
pub use pipeline::collect;
pub use stream::{
    BackoffLadder, FailureKind, QueryParameters, ReadForever, Sleeper, StreamError, StreamReader,
    classify_error,
};
