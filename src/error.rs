//! Error types for talking to the docs backend

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by a [`Transport`](crate::upload::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server answered, but not with a 2xx status.
    #[error("server responded with status {status}")]
    Status { status: u16, detail: Option<String> },

    /// No response could be obtained (refused, reset, timed out).
    #[error("failed to reach server: {0}")]
    Connect(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            Self::Connect(err.to_string())
        }
    }
}

/// Errors from a complete client operation (transport plus local file I/O).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
