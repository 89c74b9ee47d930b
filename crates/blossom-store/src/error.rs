//! Storage error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Blob not found
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Computed digest does not match the digest the client named
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Upload exceeds the configured size limit
    #[error("Blob too large: {size} bytes exceeds maximum {max}")]
    BlobTooLarge { size: u64, max: u64 },

    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
