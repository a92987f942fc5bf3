use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("no url bound to handle: {0}")]
    NotFound(String),
    #[error("handle already exists: {0}")]
    AlreadyExists(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value.to_string())
    }
}

/// Errors surfaced by the shortener service to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    /// The handle is already taken; carries the short url that already exists.
    #[error("url already shortened: {short_url}")]
    Conflict { short_url: String },
    #[error("deletion pipeline is shutting down")]
    ShuttingDown,
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(handle) => ShortenerError::NotFound(handle),
            other => ShortenerError::Storage(other),
        }
    }
}
