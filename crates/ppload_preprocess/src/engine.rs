//! The seam where a macro engine plugs in.

use std::path::{Path, PathBuf};

use ppload_diagnostics::Location;

use crate::state::MacroState;

/// The output of one successful engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The expanded text, one output line per input line.
    pub text: String,
    /// Every file the engine opened through an include-like directive.
    pub includes: Vec<PathBuf>,
    /// Zero on normal completion.
    pub exit_code: i32,
}

impl Expansion {
    /// Creates a successful expansion.
    pub fn new(text: String, includes: Vec<PathBuf>) -> Self {
        Self {
            text,
            includes,
            exit_code: 0,
        }
    }
}

/// Prefix of the [`EngineFault::Directive`] message an engine raises when the
/// input ends inside an open block. Snippet callers treat it as incomplete
/// input rather than an error.
pub const UNTERMINATED: &str = "unterminated";

/// A failure raised by a macro engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineFault {
    /// A malformed or failing directive in a source file.
    #[error("{message}")]
    Directive {
        /// File containing the directive. May be an included file.
        path: PathBuf,
        /// 1-indexed line of the directive.
        line: u32,
        /// 1-indexed column of the directive.
        column: u32,
        /// What went wrong.
        message: String,
    },
    /// The engine itself broke.
    #[error("{message}")]
    Internal {
        /// What went wrong.
        message: String,
        /// The last directive the engine processed, if any.
        last_directive: Option<Location>,
    },
}

/// A macro engine expanding one source file at a time.
///
/// Implementations must emit exactly one output line per input line and may
/// mutate `state` freely; rolling back on failure is the caller's job. Input
/// that ends inside an open block fails with a `Directive` fault whose message
/// starts with [`UNTERMINATED`].
pub trait MacroEngine: Send + Sync {
    /// Expands `text`, read from `origin`.
    fn expand(
        &self,
        text: &str,
        origin: &Path,
        state: &mut MacroState,
    ) -> Result<Expansion, EngineFault>;
}
