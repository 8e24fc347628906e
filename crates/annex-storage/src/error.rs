//! Error types for annex-storage.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identifier skips a level or carries an unsafe segment
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File exists but cannot be read
    #[error("Cannot read file: {0}")]
    Unreadable(String),

    /// Backing filesystem refused a write, create or delete
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
