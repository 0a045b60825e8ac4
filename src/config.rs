//! Collector configuration: credentials file and run settings.
//!
//! Credentials live in a YAML mapping of name to secret, e.g.
//!
//! ```yaml
//! twitter_token: AAAA...
//! ```
//!
//! [`CollectorConfig::resolve`] combines the credentials with the command-line
//! settings and checks everything that can be checked before connecting.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::output::DEFAULT_MAX_FILE_SIZE;
use crate::stream::QueryParameters;

/// Credentials file read when none is given on the command line.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.yml";

/// Credentials key holding the bearer token.
pub const TOKEN_KEY: &str = "twitter_token";

/// Errors raised while assembling the configuration. None are retryable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The credentials path is missing or not a regular file.
    #[error("credentials path {path} should be a valid file")]
    CredentialsNotAFile {
        /// The rejected path.
        path: PathBuf,
    },

    /// The credentials file could not be read.
    #[error("failed to read credentials file {path}: {source}")]
    ReadCredentials {
        /// The credentials file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The credentials file is not a YAML mapping of strings.
    #[error("failed to parse credentials: {source}")]
    ParseCredentials {
        /// The YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A required credential is absent.
    #[error("credentials are missing required key `{key}`")]
    MissingCredential {
        /// The missing key.
        key: String,
    },

    /// The output path exists and is not a folder.
    #[error("output path {path} should be a folder")]
    OutputNotAFolder {
        /// The rejected path.
        path: PathBuf,
    },

    /// The rotation threshold must be at least one byte.
    #[error("invalid max file size {value}: must be greater than 0")]
    InvalidMaxFileSize {
        /// The rejected value.
        value: u64,
    },
}

/// Named secrets loaded from the credentials file.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    entries: BTreeMap<String, String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl Credentials {
    /// Parses credentials from YAML text. An empty document has no entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseCredentials`] if the text is not a mapping
    /// of strings to strings.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::ParseCredentials { source })
    }

    /// Loads credentials from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialsNotAFile`] if `path` is not a regular
    /// file, [`ConfigError::ReadCredentials`] if it cannot be read, and
    /// [`ConfigError::ParseCredentials`] if it is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::CredentialsNotAFile {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadCredentials {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials = Self::parse(&raw)?;
        debug!(path = %path.display(), keys = credentials.entries.len(), "credentials loaded");
        Ok(credentials)
    }

    /// Returns the secret stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the secret stored under `key`, or an error naming the key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] if the key is absent.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingCredential {
            key: key.to_string(),
        })
    }
}

/// Checks that `path` is usable as an output folder (absent or a directory).
///
/// # Errors
///
/// Returns [`ConfigError::OutputNotAFolder`] if `path` exists and is not a
/// directory.
pub fn validate_output_folder(path: &Path) -> Result<(), ConfigError> {
    if path.exists() && !path.is_dir() {
        return Err(ConfigError::OutputNotAFolder {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Everything needed to run the collector.
#[derive(Clone)]
pub struct CollectorConfig {
    /// Bearer token for the stream endpoint.
    pub token: String,
    /// Query parameters forwarded on every connection.
    pub parameters: QueryParameters,
    /// Folder receiving the rotated files.
    pub output_folder: PathBuf,
    /// Rotation threshold in bytes.
    pub max_file_size: u64,
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("token", &"<redacted>")
            .field("parameters", &self.parameters)
            .field("output_folder", &self.output_folder)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

impl CollectorConfig {
    /// Creates a configuration with the default rotation threshold.
    #[must_use]
    pub fn new(token: impl Into<String>, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            token: token.into(),
            parameters: QueryParameters::new(),
            output_folder: output_folder.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Loads the token from `credentials_path` and validates the remaining
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unusable credentials file, a missing
    /// token, an output path that is not a folder, or a zero threshold.
    pub fn resolve(
        credentials_path: &Path,
        output_folder: PathBuf,
        parameters: QueryParameters,
        max_file_size: u64,
    ) -> Result<Self, ConfigError> {
        validate_output_folder(&output_folder)?;
        if max_file_size == 0 {
            return Err(ConfigError::InvalidMaxFileSize {
                value: max_file_size,
            });
        }
        let credentials = Credentials::load(credentials_path)?;
        let token = credentials.require(TOKEN_KEY)?.to_string();
        Ok(Self {
            token,
            parameters,
            output_folder,
            max_file_size,
        })
    }
}
