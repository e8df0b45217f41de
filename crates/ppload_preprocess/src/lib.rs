//! The preprocessing adapter between raw sources and the host compiler.
//!
//! A [`MacroEngine`] does the actual expansion. The [`Preprocessor`] wraps it
//! so that line numbering is checked, macro state is rolled back on failure,
//! and engine faults come out as [`PreprocessError`]s. [`DirectiveEngine`] is
//! the built-in line-preserving engine.
//!
//! [`PreprocessError`]: ppload_diagnostics::PreprocessError

#![warn(missing_docs)]

pub mod adapter;
pub mod directive;
pub mod engine;
pub mod state;

pub use adapter::{Mode, Preprocessed, Preprocessor};
pub use directive::DirectiveEngine;
pub use engine::{EngineFault, Expansion, MacroEngine, UNTERMINATED};
pub use state::MacroState;
