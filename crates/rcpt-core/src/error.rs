//! Error types for the rcpt-core library.
//!
//! Parsing itself never fails: problems found in a document are reported as
//! [`Issue`](crate::models::receipt::Issue) values on the result. These errors
//! cover configuration, lexicon compilation and input loading.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lexicon term or vendor pattern failed to compile.
    #[error("invalid lexicon pattern: {0}")]
    Lexicon(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input could not be interpreted as text or a word list.
    #[error("invalid input: {0}")]
    Input(String),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
