//! Parsing and validation of `ppload.toml` loader configuration.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`LoaderConfig`] that decides which files belong to the preprocessed
//! extension family, how cached artifacts are invalidated, and whether the
//! original or the preprocessed source wins when both exist.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_module, ResolvedSource};
pub use types::*;
