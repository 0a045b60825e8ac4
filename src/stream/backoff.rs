//! Reconnect backoff for the stream reader.
//!
//! This module provides [`BackoffLadder`] and [`classify_error`] for deciding
//! whether and how long to wait before reconnecting.
//!
//! # Overview
//!
//! When a session fails, the error is classified into a [`FailureKind`]:
//! - [`FailureKind::Transient`] - the reader sleeps and reconnects
//! - [`FailureKind::Permanent`] - the error is handed to the consumer and the
//!   reader stops
//!
//! Transient failures walk a fixed ladder of delays (2s, 10s, 100s by default).
//! The position advances on every consecutive failure and stays on the last
//! rung; it only goes back to the first rung once a record is delivered.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use collector_core::stream::BackoffLadder;
//!
//! let mut ladder = BackoffLadder::default();
//! assert_eq!(ladder.next_delay(), Duration::from_secs(2));
//! assert_eq!(ladder.next_delay(), Duration::from_secs(10));
//! assert_eq!(ladder.next_delay(), Duration::from_secs(100));
//! assert_eq!(ladder.next_delay(), Duration::from_secs(100));
//! ladder.reset();
//! assert_eq!(ladder.next_delay(), Duration::from_secs(2));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::constants::DEFAULT_BACKOFF_LADDER;
use super::error::StreamError;

/// Classification of stream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection may succeed again; back off and reconnect.
    Transient,

    /// Reconnecting cannot help; stop and surface the error.
    Permanent,
}

/// Classifies a stream error for the reconnect loop.
///
/// | Error | Kind | Rationale |
/// |-------|------|-----------|
/// | NoActiveRules (409) | Permanent | Rules must be created remotely |
/// | InvalidUrl | Permanent | Configuration fault |
/// | HttpStatus (other) | Transient | Service may recover |
/// | Network | Transient | Connection may come back |
/// | Timeout | Transient | Idle connection, reconnect |
#[instrument(level = "debug", skip(error))]
pub fn classify_error(error: &StreamError) -> FailureKind {
    match error {
        StreamError::NoActiveRules { .. } | StreamError::InvalidUrl { .. } => {
            FailureKind::Permanent
        }
        StreamError::HttpStatus { .. }
        | StreamError::Network { .. }
        | StreamError::Timeout { .. } => FailureKind::Transient,
    }
}

/// Fixed sequence of reconnect delays with a resettable position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffLadder {
    delays: Vec<Duration>,
    position: usize,
}

impl Default for BackoffLadder {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_LADDER.to_vec())
    }
}

impl BackoffLadder {
    /// Creates a ladder from explicit delays.
    ///
    /// An empty list falls back to the default ladder.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays = if delays.is_empty() {
            DEFAULT_BACKOFF_LADDER.to_vec()
        } else {
            delays
        };
        Self { delays, position: 0 }
    }

    /// Returns the delay for the current failure and advances the position.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delays[self.position];
        self.position = (self.position + 1).min(self.delays.len() - 1);
        debug!(
            delay_ms = delay.as_millis(),
            next_position = self.position,
            "backoff advanced"
        );
        delay
    }

    /// Moves back to the first delay.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the index of the delay the next failure will use.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the configured delays.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

/// Waits out a backoff delay.
///
/// The reader sleeps through this trait so tests can observe the requested
/// delays without waiting for them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the caller for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
