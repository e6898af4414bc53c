//! Repository fidelity verification.
//!
//! Proves that a remote object-store copy of a hierarchical archive (an
//! OCFL-style versioned repository) is structurally and byte-for-byte
//! identical to a known-good local copy. The check is read-only: it never
//! builds, repairs, or interprets the repository.
//!
//! # Components
//!
//! - [`PathEnumerator`]: expected file set from the local root
//! - [`ObjectLister`]: actual object set from the remote prefix, fully paginated
//! - [`ContentFetcher`]: whole-object reads by relative path
//! - [`DigestComparator`]: local/remote digest pairs under one algorithm
//! - [`RepositoryVerifier`]: runs the set comparison, then the concurrent
//!   content comparison, and produces a [`VerificationReport`]
//!
//! Structural mismatches (a path on one side only) and content mismatches (a
//! shared path whose digests differ) are accumulated and reported together.
//! Configuration, transport, and local I/O failures abort the run, since a
//! comparison built on them cannot be trusted.

pub mod comparator;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod fetcher;
pub mod lister;
pub mod phase;
pub mod report;
pub mod verifier;

pub use comparator::DigestComparator;
pub use config::VerifierConfig;
pub use enumerator::PathEnumerator;
pub use error::{VerifyError, VerifyResult};
pub use fetcher::{ContentFetcher, FetchOutcome};
pub use lister::ObjectLister;
pub use phase::VerifyPhase;
pub use report::{ContentMismatch, Verdict, VerificationReport};
pub use verifier::RepositoryVerifier;

pub use tokio_util::sync::CancellationToken;
