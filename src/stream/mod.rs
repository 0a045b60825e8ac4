//! Authenticated, self-healing reader for a newline-delimited HTTP stream.
//!
//! This module connects to a long-lived streaming endpoint and turns its
//! chunked body into a sequence of records, one JSON document per record.
//!
//! # Features
//!
//! - Bearer-token authentication and forwarded query parameters
//! - Keep-alive blank lines filtered out; each record ends with `\n`
//! - Reconnects forever on transport failures with a 2s/10s/100s ladder
//! - HTTP 409 (no rules configured) stops the reader instead of retrying
//!
//! # Example
//!
//! ```no_run
//! use collector_core::stream::{QueryParameters, StreamReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = StreamReader::new("my-token", QueryParameters::parse("tweet.fields=created_at"))?;
//! let mut source = reader.read_forever();
//! while let Some(record) = source.next_record().await {
//!     let record = record?;
//!     print!("{}", String::from_utf8_lossy(&record));
//! }
//! # Ok(())
//! # }
//! ```

mod backoff;
mod constants;
mod error;
mod lines;
mod params;
mod reader;
mod record;

pub use backoff::{BackoffLadder, FailureKind, Sleeper, TokioSleeper, classify_error};
pub use constants::{CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_LADDER, DEFAULT_STREAM_URL, READ_TIMEOUT_SECS};
pub use error::StreamError;
pub use params::QueryParameters;
pub use reader::{ReadForever, Session, StreamReader, StreamReaderBuilder};
