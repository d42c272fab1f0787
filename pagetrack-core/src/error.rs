//! Error types for pagetrack-core

use thiserror::Error;

/// Main error type for the pagetrack-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Network send failed or the endpoint answered with a non-success status
    #[error("transport error: {0}")]
    Transport(String),

    /// Event payload did not have the expected shape
    #[error("{0}")]
    Validation(String),

    /// No async runtime available to schedule sends
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for pagetrack-core
pub type Result<T> = std::result::Result<T, Error>;
