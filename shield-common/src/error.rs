//! Common error types for Shield jobs

use std::fmt;
use thiserror::Error;

/// Common result type for Shield operations
pub type Result<T> = std::result::Result<T, Error>;

/// One failed artifact upload, as collected by a publication run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailureDetail {
    /// Artifact name (`all`, a submission date, `latest`)
    pub artifact: String,
    /// Format extension (`json` or `csv`)
    pub format: String,
    pub reason: String,
}

impl fmt::Display for PublishFailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.artifact, self.format, self.reason)
    }
}

/// Common error types across Shield jobs
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required upstream document could not be retrieved
    #[error("Source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// A retrieved document could not be decoded
    #[error("Parse failure in {what}: {reason}")]
    ParseFailure { what: String, reason: String },

    /// A single artifact upload failed
    #[error("Publish failure for {artifact}.{format}: {reason}")]
    PublishFailure {
        artifact: String,
        format: String,
        reason: String,
    },

    /// One or more artifacts failed during a publication run
    #[error("{} artifact upload(s) failed: {}", .0.len(), join_failures(.0))]
    Publish(Vec<PublishFailureDetail>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_failures(failures: &[PublishFailureDetail]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<PublishFailureDetail> for Error {
    fn from(detail: PublishFailureDetail) -> Self {
        Error::PublishFailure {
            artifact: detail.artifact,
            format: detail.format,
            reason: detail.reason,
        }
    }
}
