use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid relative path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("key {key:?} is not under prefix {prefix:?}")]
    KeyOutsidePrefix { key: String, prefix: String },

    #[error("key {0:?} is a directory marker, not an object")]
    DirectoryMarker(String),
}

pub type TypeResult<T> = Result<T, TypeError>;
