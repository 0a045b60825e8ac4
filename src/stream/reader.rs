//! Resilient reader for a long-lived HTTP record stream.
//!
//! [`StreamReader`] holds the connection settings. Each call to
//! [`StreamReader::open_session`] issues one authenticated GET and returns a
//! [`Session`] that yields newline-delimited records until the body ends.
//! [`StreamReader::read_forever`] wraps sessions in a reconnect loop
//! ([`ReadForever`]) that backs off on transport failures and only stops on
//! a permanent error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

use super::backoff::{BackoffLadder, FailureKind, Sleeper, TokioSleeper, classify_error};
use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_LADDER, DEFAULT_STREAM_URL, MAX_ERROR_BODY_LEN,
    READ_TIMEOUT_SECS,
};
use super::error::StreamError;
use super::lines::LineBuffer;
use super::params::QueryParameters;
use super::record::{RecordKind, inspect_record};
use crate::user_agent;

/// Authenticated connection settings for the record stream.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct StreamReader {
    client: Client,
    endpoint: Url,
    token: String,
    parameters: QueryParameters,
    backoff: Vec<Duration>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .field("parameters", &self.parameters)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StreamReader`].
pub struct StreamReaderBuilder {
    token: String,
    endpoint: String,
    parameters: QueryParameters,
    connect_timeout: Duration,
    read_timeout: Duration,
    backoff: Vec<Duration>,
    sleeper: Arc<dyn Sleeper>,
}

impl StreamReaderBuilder {
    /// Overrides the stream endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the query parameters sent with every connection.
    #[must_use]
    pub fn parameters(mut self, parameters: QueryParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the connect timeout and the idle timeout between body reads.
    #[must_use]
    pub fn timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Replaces the reconnect delay ladder.
    #[must_use]
    pub fn backoff(mut self, delays: Vec<Duration>) -> Self {
        self.backoff = delays;
        self
    }

    /// Replaces how backoff delays are waited out.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Builds the reader.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidUrl`] if the endpoint is not an
    /// http(s) URL, or [`StreamError::Network`] if the HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<StreamReader, StreamError> {
        let endpoint = Url::parse(&self.endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| StreamError::invalid_url(self.endpoint.clone()))?;

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| StreamError::network(endpoint.as_str(), e))?;

        Ok(StreamReader {
            client,
            endpoint,
            token: self.token,
            parameters: self.parameters,
            backoff: self.backoff,
            sleeper: self.sleeper,
        })
    }
}

impl StreamReader {
    /// Starts building a reader authenticated with `token`.
    ///
    /// Defaults: the filtered-stream endpoint, no parameters, 30s connect
    /// timeout, 60s read timeout, a 2s/10s/100s backoff ladder and tokio
    /// sleeps.
    #[must_use]
    pub fn builder(token: impl Into<String>) -> StreamReaderBuilder {
        StreamReaderBuilder {
            token: token.into(),
            endpoint: DEFAULT_STREAM_URL.to_string(),
            parameters: QueryParameters::new(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            backoff: DEFAULT_BACKOFF_LADDER.to_vec(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Creates a reader for the default endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`StreamReaderBuilder::build`].
    pub fn new(
        token: impl Into<String>,
        parameters: QueryParameters,
    ) -> Result<Self, StreamError> {
        Self::builder(token).parameters(parameters).build()
    }

    /// Returns the endpoint URL without query parameters.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the query parameters sent with each connection.
    #[must_use]
    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        self.parameters.apply_to(&mut url);
        url
    }

    /// Opens one streaming connection.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NoActiveRules`] for HTTP 409,
    /// [`StreamError::HttpStatus`] for any other non-success status, and
    /// [`StreamError::Network`] / [`StreamError::Timeout`] when the request
    /// cannot be completed.
    #[instrument(skip(self), fields(url = %self.endpoint))]
    pub async fn open_session(&self) -> Result<Session, StreamError> {
        let url = self.request_url();
        debug!("connecting to stream");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StreamError::network(self.endpoint.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            error!(
                status = status.as_u16(),
                "stream has no active rules; refusing to reconnect"
            );
            return Err(StreamError::no_active_rules(self.endpoint.as_str()));
        }

        if !status.is_success() {
            let body = read_error_body(response).await;
            error!(
                status = status.as_u16(),
                body = %body,
                "error returned by stream endpoint"
            );
            return Err(StreamError::http_status(
                self.endpoint.as_str(),
                status.as_u16(),
                body,
            ));
        }

        info!(status = status.as_u16(), "stream connected");
        Ok(Session::new(self.endpoint.to_string(), response))
    }

    /// Returns a reconnecting record source.
    #[must_use]
    pub fn read_forever(&self) -> ReadForever {
        ReadForever::new(self.clone())
    }

    /// Returns the reconnecting record source as a [`Stream`].
    pub fn records(&self) -> impl Stream<Item = Result<Vec<u8>, StreamError>> + use<> {
        self.read_forever().into_stream()
    }
}

async fn read_error_body(response: Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Records from one open connection.
///
/// Keep-alive blank lines are skipped; every other line is returned with a
/// trailing `\n`.
pub struct Session {
    url: String,
    response: Response,
    lines: LineBuffer,
    body_done: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("pending_bytes", &self.lines.pending())
            .field("body_done", &self.body_done)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new(url: String, response: Response) -> Self {
        Self {
            url,
            response,
            lines: LineBuffer::new(),
            body_done: false,
        }
    }

    /// Waits for the next record.
    ///
    /// Returns `Ok(None)` once the server ends the body.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Network`] or [`StreamError::Timeout`] if reading
    /// the body fails. Partially received lines are discarded.
    pub async fn next_record(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        loop {
            while let Some(line) = self.lines.next_line() {
                if line.is_empty() {
                    trace!("keep-alive received");
                    continue;
                }
                return Ok(Some(terminate(line)));
            }

            if self.body_done {
                return Ok(self
                    .lines
                    .take_remainder()
                    .filter(|line| !line.is_empty())
                    .map(terminate));
            }

            match self.response.chunk().await {
                Ok(Some(chunk)) => self.lines.push(&chunk),
                Ok(None) => self.body_done = true,
                Err(e) => return Err(StreamError::network(self.url.clone(), e)),
            }
        }
    }
}

fn terminate(mut line: Vec<u8>) -> Vec<u8> {
    line.push(b'\n');
    line
}

enum ReaderState {
    Connecting,
    Streaming(Session),
    Stopped,
}

/// Reconnecting record source.
///
/// A server-side close of the body reconnects at once. Transient failures
/// are absorbed: the reader sleeps for the current backoff delay and
/// reconnects. Each delivered record resets the backoff. A permanent failure
/// is returned once, after which the source is exhausted.
pub struct ReadForever {
    reader: StreamReader,
    ladder: BackoffLadder,
    state: ReaderState,
    delivered: u64,
}

impl fmt::Debug for ReadForever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            ReaderState::Connecting => "connecting",
            ReaderState::Streaming(_) => "streaming",
            ReaderState::Stopped => "stopped",
        };
        f.debug_struct("ReadForever")
            .field("endpoint", &self.reader.endpoint.as_str())
            .field("state", &state)
            .field("backoff_position", &self.ladder.position())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl ReadForever {
    fn new(reader: StreamReader) -> Self {
        let ladder = BackoffLadder::new(reader.backoff.clone());
        Self {
            reader,
            ladder,
            state: ReaderState::Connecting,
            delivered: 0,
        }
    }

    /// Position on the backoff ladder the next failure will use.
    #[must_use]
    pub fn backoff_position(&self) -> usize {
        self.ladder.position()
    }

    /// Number of records delivered so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Pulls the next record, reconnecting as often as needed.
    ///
    /// Returns `None` only after a permanent error has been returned.
    pub async fn next_record(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        loop {
            let failure = match self.state {
                ReaderState::Stopped => return None,
                ReaderState::Connecting => match self.reader.open_session().await {
                    Ok(session) => {
                        self.state = ReaderState::Streaming(session);
                        continue;
                    }
                    Err(e) => e,
                },
                ReaderState::Streaming(ref mut session) => match session.next_record().await {
                    Ok(Some(record)) => {
                        self.ladder.reset();
                        self.delivered += 1;
                        log_record(&record);
                        return Some(Ok(record));
                    }
                    Ok(None) => {
                        info!("stream closed by server; reconnecting");
                        self.state = ReaderState::Connecting;
                        continue;
                    }
                    Err(e) => e,
                },
            };

            if let Some(fatal) = self.recover(failure).await {
                return Some(Err(fatal));
            }
        }
    }

    /// Backs off after a transient failure, or stops on a permanent one.
    async fn recover(&mut self, failure: StreamError) -> Option<StreamError> {
        match classify_error(&failure) {
            FailureKind::Permanent => {
                error!(error = %failure, "stream failed permanently");
                self.state = ReaderState::Stopped;
                Some(failure)
            }
            FailureKind::Transient => {
                self.state = ReaderState::Connecting;
                let delay = self.ladder.next_delay();
                warn!(
                    error = %failure,
                    delay_secs = delay.as_secs_f64(),
                    "error when reading stream; reconnecting after delay"
                );
                self.reader.sleeper.sleep(delay).await;
                None
            }
        }
    }

    /// Adapts this source into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>, StreamError>> {
        stream::unfold(self, |mut source| async move {
            let item = source.next_record().await?;
            Some((item, source))
        })
    }
}

fn log_record(record: &[u8]) {
    match inspect_record(record) {
        RecordKind::Tweet { id } => {
            debug!(id = id.as_deref().unwrap_or("-"), len = record.len(), "received a tweet");
        }
        RecordKind::Errors { messages } => {
            warn!(errors = ?messages, "stream delivered an error notice");
        }
        RecordKind::Unrecognized => {
            debug!(len = record.len(), "received an unrecognized record");
        }
    }
}
