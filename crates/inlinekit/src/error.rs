//! Error types for InlineKit

use crate::types::ReferenceKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a single referenced resource
#[derive(Debug, Error)]
pub enum InlineError {
    /// Local file does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Local file exists but could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Server answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Transport gave up waiting
    #[error("Request timed out")]
    Timeout,

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Reference could not be turned into a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// No registered loader accepts the resolved location
    #[error("No loader available for {0}")]
    UnsupportedLocation(String),
}

/// Coarse classification of a per-resource failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local resource absent or unreadable
    FileNotFound,
    /// Remote resource returned a non-success status or the transport failed
    FetchFailed,
}

impl InlineError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InlineError::Timeout
        } else if err.is_connect() {
            InlineError::ConnectError(err)
        } else {
            InlineError::RequestError(err.to_string())
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            InlineError::FileNotFound { .. } | InlineError::Io { .. } => ErrorKind::FileNotFound,
            _ => ErrorKind::FetchFailed,
        }
    }
}

/// One reference that could not be inlined
#[derive(Debug)]
pub struct ResourceFailure {
    /// Reference exactly as written in the document
    pub reference: String,
    /// Resolved location (path or URL) that was attempted
    pub location: String,
    /// What kind of construct carried the reference
    pub kind: ReferenceKind,
    /// Why it failed
    pub error: InlineError,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.reference, self.location, self.error)
    }
}

/// Every failure from one inlining call, surfaced in strict mode
#[derive(Debug, Default)]
pub struct AggregateError {
    pub failures: Vec<ResourceFailure>,
}

impl AggregateError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resource(s) could not be inlined",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
