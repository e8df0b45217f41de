//! Shared foundational types used across the ppload crates.
//!
//! This crate provides the content hash used for hash-based cache
//! invalidation, whole-second modification times for timestamp-based
//! invalidation, and the common internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod mtime;
pub mod result;

pub use hash::SourceHash;
pub use mtime::Mtime;
pub use result::InternalError;
