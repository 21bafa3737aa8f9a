use thiserror::Error;

/// Error type for storage backend operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// No content is stored under the given key
    #[error("No stored file with key '{0}'")]
    NotFound(String),

    /// Key is not something this service could have generated (path separators, `..`, empty)
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    /// Key already holds content; stored files are immutable
    #[error("Storage key '{0}' already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Whether the error means "there is nothing under this key" from a caller's point of view
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_) | StorageError::InvalidKey(_))
    }
}

/// Type alias for storage operation results
pub type Result<T> = std::result::Result<T, StorageError>;
