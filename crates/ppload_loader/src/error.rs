//! Errors surfaced to the host while loading a unit.

use std::path::PathBuf;

use ppload_common::InternalError;
use ppload_diagnostics::{PreprocessError, ReportedError, SourceError};

/// Errors that can occur while loading a unit.
///
/// Cache problems never appear here; they only cause recompilation.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The source file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The preprocessor rejected the file.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// The host compiler rejected the (preprocessed) text.
    #[error(transparent)]
    Syntax(#[from] SourceError),

    /// A file to be preprocessed is not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    NotUtf8 {
        /// The offending file.
        path: PathBuf,
    },

    /// A bug in ppload itself.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl LoadError {
    /// Converts the error into the form used for error reports.
    ///
    /// Faults in ppload stay internal; other errors without a source
    /// location become runtime failures.
    pub fn to_reported(&self) -> ReportedError {
        match self {
            LoadError::Syntax(err) => ReportedError::Syntax(err.clone()),
            LoadError::Preprocess(err) => ReportedError::Preprocess(err.clone()),
            LoadError::Internal(err) => ReportedError::Internal {
                message: err.to_string(),
            },
            other => ReportedError::Runtime {
                message: other.to_string(),
            },
        }
    }
}
