//! Dependency-aware compiled-artifact cache.
//!
//! A cache entry is the host's unmodified header and compiled unit, followed
//! for preprocessed sources by a trailer recording a fingerprint (mtime or
//! content hash) of every file the preprocessor pulled in. The
//! [`StalenessValidator`] runs the host's own header check first and the
//! trailer check second; any doubt results in recompilation, never an error.

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod header;
pub mod registry;
pub mod store;
pub mod validator;

pub use codec::{deserialize, serialize, CacheRecord, CompiledUnit, TrailerState};
pub use error::CacheError;
pub use fingerprint::{FingerprintMode, Trailer};
pub use header::{host_source_hash, CacheHeader, HEADER_LEN};
pub use registry::{DependencyRegistry, DependencySnapshot, UnitId};
pub use store::CacheStore;
pub use validator::{Freshness, StaleReason, StalenessValidator, ValidationState};
