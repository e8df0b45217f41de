//! Error taxonomy, error rewriting and rendering for preprocessed sources.
//!
//! This crate provides the closed set of user-facing errors ([`SourceError`],
//! [`PreprocessError`]), the [`ErrorReport`] built by [`rewrite_error`] which
//! substitutes preprocessed line text and trims loader frames from a
//! [`Traceback`], and the [`TerminalRenderer`] that formats reports.

#![warn(missing_docs)]

pub mod error;
pub mod renderer;
pub mod report;
pub mod trace;

pub use error::{Location, PreprocessError, SourceError};
pub use renderer::{ReportRenderer, TerminalRenderer};
pub use report::{rewrite_error, ErrorReport, ReportedError};
pub use trace::{Frame, Traceback};
