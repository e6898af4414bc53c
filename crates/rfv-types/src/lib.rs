//! Foundation types for the repository fidelity verifier (RFV).
//!
//! Every comparison RFV performs hinges on one invariant: the same logical
//! file produces the same [`RelativePath`] no matter which backend it was
//! enumerated from. This crate owns the types that enforce it.
//!
//! # Key Types
//!
//! - [`RelativePath`]: Validated, `/`-separated path relative to a root or prefix
//! - [`KeyPrefix`]: Remote key prefix; the single authority for key normalization
//! - [`ExclusionSet`]: Table of literal names and paths that are never content

pub mod error;
pub mod exclusion;
pub mod path;

pub use error::{TypeError, TypeResult};
pub use exclusion::ExclusionSet;
pub use path::{KeyPrefix, RelativePath, SEPARATOR};
