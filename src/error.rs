//! Error types for specimen-dl
//!
//! Two layers of errors exist:
//! - [`Error`] is surfaced to callers of the acquisition engine (fatal name
//!   resolution, upstream search failures, ledger I/O, bad configuration)
//! - [`DownloadError`] describes a single failed asset transfer. These are
//!   absorbed by the acquisition loop and only ever show up in statistics.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for specimen-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for specimen-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.output_dir")
        key: Option<String>,
    },

    /// The taxonomic lookup returned no match for the requested name
    #[error("scientific name '{name}' did not match any taxon")]
    NameNotResolved {
        /// The raw name as supplied by the caller
        name: String,
    },

    /// Upstream API answered with an unexpected status
    #[error("upstream API returned status {status} for {endpoint}")]
    Upstream {
        /// Endpoint path that was called (e.g., "occurrence/search")
        endpoint: String,
        /// HTTP status code returned
        status: u16,
    },

    /// The citation download request was not accepted
    #[error("citation request rejected with status {status}: {body}")]
    CitationRejected {
        /// HTTP status code returned
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// A ledger file could not be parsed
    #[error("malformed ledger {path} at line {line}: {reason}")]
    MalformedLedger {
        /// Ledger file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL (API base URL or media locator)
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Per-asset transfer errors
///
/// None of these abort an acquisition; they are recorded as a failed outcome
/// for the record and the loop moves on.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The validity probe could not reach the host
    #[error("probe failed for {url}")]
    Unreachable {
        /// Media URL that failed the probe
        url: String,
    },

    /// Transport-level failure (timeout, connection reset, protocol error)
    #[error("transfer of {url} failed: {source}")]
    Transport {
        /// Media URL being transferred
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("transfer of {url} returned status {status}")]
    Status {
        /// Media URL being transferred
        url: String,
        /// Observed HTTP status code
        status: u16,
    },

    /// The URL path carries an extension outside the accepted set
    #[error("extension '{extension}' of {url} is not an accepted image type")]
    RejectedExtension {
        /// Media URL
        url: String,
        /// The offending extension, including the leading dot
        extension: String,
    },

    /// The media locator is not a valid URL
    #[error("invalid media URL {url}: {source}")]
    InvalidUrl {
        /// The raw locator
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// Writing the asset to disk failed
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Transfer was abandoned because the acquisition target was reached
    #[error("transfer cancelled")]
    Cancelled,
}

impl DownloadError {
    /// The HTTP status observed before the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
