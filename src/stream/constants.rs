//! Constants for the stream module (endpoint, timeouts, backoff ladder).

use std::time::Duration;

/// Filtered-stream endpoint the reader connects to by default.
pub const DEFAULT_STREAM_URL: &str = "https://api.twitter.com/2/tweets/search/stream";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout between body reads (60 seconds).
///
/// The service sends a keep-alive line every 20 seconds, so three missed
/// keep-alives count as a dead connection.
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Reconnect delays, advanced on each consecutive failure and clamped at the last.
pub const DEFAULT_BACKOFF_LADDER: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(100),
];

/// Maximum number of response body bytes kept for error logging.
pub const MAX_ERROR_BODY_LEN: usize = 2048;
