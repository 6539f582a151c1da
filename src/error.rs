//! Error Types
//!
//! Errors raised at the seams of the library. Quota exhaustion is never an
//! error: both the rate limiter and the usage tracker report it as a
//! structured result.

use std::path::PathBuf;

/// Error types for the usage log key-value layer
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty or contains characters outside `[A-Za-z0-9_-]`
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Error returned when parsing user-supplied enumeration labels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown premium service: {0}. Must be one of: claude_pro, chatgpt_plus, gemini_advanced")]
    UnknownService(String),

    #[error("Unknown thinking mode: {0}. Must be one of: quick, balanced, deep")]
    UnknownThinkingMode(String),
}
