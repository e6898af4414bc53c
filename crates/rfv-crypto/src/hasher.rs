use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::algorithm::DigestAlgorithm;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex encoding of a content digest.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    fn from_raw(raw: &[u8]) -> Self {
        Self(hex::encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Debug for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexDigest({})", self.short_hex())
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expected (local) and actual (remote) digests of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestPair {
    pub expected: HexDigest,
    pub actual: HexDigest,
}

impl DigestPair {
    /// The per-file acceptance criterion.
    pub fn matches(&self) -> bool {
        self.expected == self.actual
    }
}

/// Content digester bound to a single [`DigestAlgorithm`].
///
/// A verification run builds one digester and uses it for both the local and
/// the remote side of every comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentDigester {
    algorithm: DigestAlgorithm,
}

enum Running {
    Md5(Md5),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Running {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> HexDigest {
        match self {
            Self::Md5(h) => HexDigest::from_raw(&h.finalize()),
            Self::Sha256(h) => HexDigest::from_raw(&h.finalize()),
            Self::Blake3(h) => HexDigest::from_raw(h.finalize().as_bytes()),
        }
    }
}

impl ContentDigester {
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest an in-memory buffer.
    pub fn digest(&self, data: &[u8]) -> HexDigest {
        let mut running = Running::new(self.algorithm);
        running.update(data);
        running.finalize()
    }

    /// Digest everything readable from `reader`.
    pub fn digest_reader(&self, mut reader: impl Read) -> io::Result<HexDigest> {
        let mut running = Running::new(self.algorithm);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            running.update(&buf[..n]);
        }
        Ok(running.finalize())
    }

    /// Digest a local file without loading it into memory.
    pub fn digest_file(&self, path: &Path) -> io::Result<HexDigest> {
        self.digest_reader(File::open(path)?)
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &HexDigest) -> bool {
        self.digest(data) == *expected
    }
}
