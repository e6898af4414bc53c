use rfv_crypto::DigestAlgorithm;
use rfv_types::ExclusionSet;
use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

/// Configuration for a verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Digest used on both sides of every comparison.
    pub algorithm: DigestAlgorithm,
    /// Names and paths left out of both enumerations.
    pub exclusions: ExclusionSet,
    /// Maximum number of files fetched and compared at once.
    pub concurrency: usize,
    /// Keys requested per listing page. `None` leaves it to the store.
    pub page_size: Option<usize>,
    /// Bytes of remote content kept in each content-mismatch entry.
    pub preview_bytes: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::Md5,
            exclusions: ExclusionSet::ocfl_fixture(),
            concurrency: 8,
            page_size: Some(1000),
            preview_bytes: 4096,
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> VerifyResult<()> {
        if self.concurrency == 0 {
            return Err(VerifyError::Configuration(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(VerifyError::Configuration(
                "page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
