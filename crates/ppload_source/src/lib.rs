//! Source text management for preprocessed files.
//!
//! This crate provides [`SourceText`] for line-indexed access to a file's
//! text and [`PreprocessedSources`], the registry that remembers the last
//! preprocessed text of every origin file so error reporting can show the
//! code the compiler actually saw.

#![warn(missing_docs)]

pub mod registry;
pub mod source_text;

pub use registry::{LineSource, PreprocessedSources, SourceSlot};
pub use source_text::SourceText;
