//! Content digests for the repository fidelity verifier.
//!
//! A verification run computes one digest per file on each side and compares
//! the hex encodings. Both sides must use the same [`DigestAlgorithm`], so the
//! algorithm is fixed when a [`ContentDigester`] is built and never passed per
//! call.
//!
//! All digest operations wrap established libraries; no custom cryptography.

pub mod algorithm;
pub mod hasher;

pub use algorithm::{DigestAlgorithm, UnknownAlgorithm};
pub use hasher::{ContentDigester, DigestPair, HexDigest};
