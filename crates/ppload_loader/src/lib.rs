//! Loader integration for preprocessed sources with dependency-aware caching.
//!
//! A [`CompilationContext`] owns every piece of shared state: the
//! configuration, the dependency and preprocessed-source registries, the
//! cache store and the per-unit locks. The host plugs in through the
//! [`Host`] trait and calls the context at four seams:
//!
//! - [`get_source_bytes`](CompilationContext::get_source_bytes)
//! - [`source_to_unit`](CompilationContext::source_to_unit)
//! - [`serialize_cache`](CompilationContext::serialize_cache)
//! - [`validate_cache`](CompilationContext::validate_cache)
//!
//! [`get_code`](CompilationContext::get_code) strings them together.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod host;

pub use context::{Compiled, CompilationContext};
pub use error::LoadError;
pub use host::Host;
