//! The error type for faults in ppload itself.

use std::fmt;
use std::path::{Path, PathBuf};

/// A fault in the loader or in a collaborator it drives.
///
/// Never caused by the user's program. Reports built from it are labeled
/// internal so they are not mistaken for mistakes in user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    /// What went wrong.
    pub message: String,
    /// The unit being loaded when the fault happened, if known.
    pub origin: Option<PathBuf>,
}

impl InternalError {
    /// Creates an internal error with no associated unit.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: None,
        }
    }

    /// Attaches the unit being loaded.
    pub fn while_loading(mut self, origin: impl AsRef<Path>) -> Self {
        self.origin = Some(origin.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(
                f,
                "internal error while loading {}: {}",
                origin.display(),
                self.message
            ),
            None => write!(f, "internal error: {}", self.message),
        }
    }
}

impl std::error::Error for InternalError {}
