/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// The requested object was not found.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The continuation token was not issued by this store.
    #[error("invalid continuation token: {0}")]
    InvalidContinuationToken(String),

    /// Network, authentication, or timeout failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the error means the object simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
