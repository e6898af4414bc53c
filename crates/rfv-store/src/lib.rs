//! Key-addressed object storage for the repository fidelity verifier.
//!
//! The verifier is a read-only client of a remote object store: it needs
//! paginated prefix listings and whole-object reads, nothing else. This crate
//! defines that seam and ships two backends.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- bucket maps with a configurable page size, for tests
//! - [`FsObjectStore`] -- directory-per-bucket store over a local or mounted tree
//!
//! # Design Rules
//!
//! 1. Listings are paginated. A page without a continuation token is the last one.
//! 2. Keys are returned in ascending lexicographic order within a listing.
//! 3. Concurrent reads are always safe; nothing in this crate mutates a backend
//!    on behalf of the verifier.
//! 4. A missing object is [`StoreError::NotFound`]; every other failure is a
//!    transport or I/O error and is never reported as "missing".

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ListPage, ListRequest, ObjectStore, ObjectSummary};
