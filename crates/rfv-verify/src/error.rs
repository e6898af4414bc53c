use std::path::PathBuf;

use rfv_store::StoreError;
use rfv_types::TypeError;
use thiserror::Error;

use crate::phase::VerifyPhase;

/// Fatal verification errors.
///
/// Any of these means the comparison itself cannot be trusted, so the run is
/// aborted. Structural and content mismatches are not errors: they are
/// collected in the [`VerificationReport`](crate::VerificationReport).
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("local I/O error at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local path {} cannot be normalized: {source}", path.display())]
    InvalidLocalPath {
        path: PathBuf,
        #[source]
        source: TypeError,
    },

    #[error("remote key {key:?} cannot be normalized: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: TypeError,
    },

    #[error("transport error during {operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error("verification cancelled during {phase}")]
    Cancelled { phase: VerifyPhase },

    #[error("worker task failed: {0}")]
    Task(String),
}

impl VerifyError {
    /// Classify a store failure. A missing bucket is a configuration problem;
    /// everything else is transport.
    pub(crate) fn from_store(operation: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::NoSuchBucket(bucket) => {
                Self::Configuration(format!("bucket {bucket:?} does not exist"))
            }
            source => Self::Transport {
                operation: operation.into(),
                source,
            },
        }
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
