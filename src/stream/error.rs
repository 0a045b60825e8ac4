//! Error types for the stream module.
//!
//! Failures are split into two families: configuration faults the caller
//! must fix ([`StreamError::NoActiveRules`], [`StreamError::InvalidUrl`]) and
//! transport faults the reader recovers from by reconnecting. See
//! [`classify_error`](super::classify_error).

use thiserror::Error;

use super::backoff::{FailureKind, classify_error};

/// Errors that can occur while connecting to or reading from the stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream has no filter rules configured (HTTP 409).
    #[error(
        "stream at {url} has no active rules; create at least one rule on the stream before connecting"
    )]
    NoActiveRules {
        /// The endpoint that refused the connection.
        url: String,
    },

    /// The endpoint URL could not be parsed.
    #[error("invalid stream URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// HTTP error response other than 409.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The endpoint that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The (possibly truncated) response body.
        body: String,
    },

    /// Network-level error (DNS, connection refused, TLS, body read failure).
    #[error("network error reading {url}: {source}")]
    Network {
        /// The endpoint being read.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connecting or waiting for the next chunk timed out.
    #[error("timeout reading {url}")]
    Timeout {
        /// The endpoint being read.
        url: String,
    },
}

impl StreamError {
    /// Creates a no-active-rules error.
    pub fn no_active_rules(url: impl Into<String>) -> Self {
        Self::NoActiveRules { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Returns `true` if reconnecting may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        classify_error(self) == FailureKind::Transient
    }
}
