use std::io;
use std::path::Path;

use rfv_crypto::{ContentDigester, DigestAlgorithm, DigestPair, HexDigest};

/// Computes and pairs the local and remote digests of one file.
///
/// The algorithm is fixed at construction, so both sides of every pair are
/// always produced by the same digest.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestComparator {
    digester: ContentDigester,
}

impl DigestComparator {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            digester: ContentDigester::new(algorithm),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.digester.algorithm()
    }

    pub fn digest(&self, data: &[u8]) -> HexDigest {
        self.digester.digest(data)
    }

    /// Digest a local file and fetched remote bytes.
    pub fn compare_file(&self, local: &Path, remote: &[u8]) -> io::Result<DigestPair> {
        Ok(DigestPair {
            expected: self.digester.digest_file(local)?,
            actual: self.digester.digest(remote),
        })
    }

    pub fn compare_bytes(&self, local: &[u8], remote: &[u8]) -> DigestPair {
        DigestPair {
            expected: self.digester.digest(local),
            actual: self.digester.digest(remote),
        }
    }
}
