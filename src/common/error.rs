//! Error types for prospect-together

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Encoding Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Inflate error: {0}")]
    Inflate(String),

    // === Snapshot Errors ===
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Unsupported snapshot version {found} (newest known is {newest})")]
    UnsupportedVersion { found: u32, newest: u32 },

    #[error("Failed to load prospecting data from '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    // === Sync Channel Errors ===
    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an error with the data file it came from.
    pub fn load(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Load {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Can the caller drop the offending message and keep running?
    ///
    /// Chat payload and wire frame failures only affect one message; snapshot
    /// load failures must abort startup instead of discarding stored data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Base64(_)
                | Error::Inflate(_)
                | Error::Encoding(_)
                | Error::Frame(_)
                | Error::Corrupted(_)
                | Error::UnsupportedVersion { .. }
        )
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
