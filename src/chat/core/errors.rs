//! Error types for the chat session subsystem.

use thiserror::Error;

/// Errors raised by the key-value byte store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the store capacity.
    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes the write would occupy.
        needed: usize,
        /// Bytes still free before the write.
        available: usize,
    },
    /// I/O error from a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error while encoding or decoding an entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Convenience result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
