//! User-facing source and preprocessing errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A position in a file, used where only an approximate location is known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The file the location points into.
    pub path: PathBuf,
    /// 1-indexed line number.
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// A malformed source file, in the shape the host reports syntax errors.
///
/// Raised both by the preprocessor (bad directives) and by the host compiler
/// (bad code after expansion). `text` is the offending line as displayed to
/// the user, if known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({}:{line})", .path.display())]
pub struct SourceError {
    /// Description of the problem.
    pub message: String,
    /// The file containing the problem.
    pub path: PathBuf,
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
    /// Text of the offending line.
    pub text: Option<String>,
}

impl SourceError {
    /// Creates a source error without line text.
    pub fn new(message: impl Into<String>, path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            line,
            column,
            text: None,
        }
    }

    /// Attaches the offending line text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns the location of this error.
    pub fn location(&self) -> Location {
        Location {
            path: self.path.clone(),
            line: self.line,
        }
    }
}

/// Errors raised while running the macro preprocessor over a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PreprocessError {
    /// A malformed directive in the user's source.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A fault inside the macro engine itself, not in the user's source.
    #[error("internal preprocessor error{}: {message}", .location.as_ref().map(|l| format!(" at around {l}")).unwrap_or_default())]
    Internal {
        /// Description of the fault.
        message: String,
        /// Best-effort location of the last directive processed.
        location: Option<Location>,
    },

    /// The macro engine finished without raising but reported failure.
    #[error("preprocessor exit code is not zero ({code})")]
    NonZeroExit {
        /// The exit code reported by the engine.
        code: i32,
    },
}

impl PreprocessError {
    /// Returns `true` for faults that are not the user's mistake.
    pub fn is_internal(&self) -> bool {
        matches!(self, PreprocessError::Internal { .. })
    }
}
