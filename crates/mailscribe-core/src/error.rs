//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The mail server could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The mail server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// IMAP operation failed after login.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailscribe_imap::Error),

    /// Header or body text could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] mailscribe_mime::Error),

    /// Model output was not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A record is missing a required field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Writing a record to disk failed.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure talking to the model backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The model backend answered with an error or an unusable reply.
    #[error("Model error (HTTP {status}): {message}")]
    Model {
        /// HTTP status of the reply.
        status: u16,
        /// Response body or a description of what was missing.
        message: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
