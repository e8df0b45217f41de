//! Rewriting failures into reports that show the code the compiler saw.

use std::path::Path;

use ppload_source::PreprocessedSources;
use serde::{Deserialize, Serialize};

use crate::error::{PreprocessError, SourceError};
use crate::trace::{Frame, Traceback};

/// The failure a report is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedError {
    /// The host compiler rejected (preprocessed) source.
    Syntax(SourceError),
    /// The preprocessor failed.
    Preprocess(PreprocessError),
    /// The program failed while running.
    Runtime {
        /// The runtime's description of the failure.
        message: String,
    },
    /// ppload itself failed while loading the program.
    Internal {
        /// Description of the fault.
        message: String,
    },
}

/// A failure ready to be shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// The (possibly rewritten) error.
    pub error: ReportedError,
    /// The frames to display, outermost first.
    pub frames: Vec<Frame>,
    /// Set when the failure is a fault in ppload or the macro engine rather
    /// than in the user's program.
    pub internal: bool,
}

/// Builds the report for `error` raised with stack `trace`.
///
/// Syntax errors in a file with recorded preprocessed text get that text's
/// line as their displayed line; line numbers are preserved by preprocessing,
/// so the lookup is direct. When `entry` is given, frames before the first
/// frame of `entry` are dropped. If no frame belongs to `entry` the whole
/// trace is kept, and a runtime failure is flagged internal. Loader faults
/// are always flagged internal.
pub fn rewrite_error(
    error: ReportedError,
    trace: &Traceback,
    entry: Option<&Path>,
    sources: &PreprocessedSources,
) -> ErrorReport {
    let error = match error {
        ReportedError::Syntax(err) => ReportedError::Syntax(substitute_line(err, sources)),
        other => other,
    };

    let (frames, untrimmable) = match entry {
        Some(entry) => match trace.trim_to_entry(entry) {
            Some(frames) => (frames.to_vec(), false),
            None => (trace.frames.clone(), true),
        },
        None => (trace.frames.clone(), false),
    };

    let internal = match &error {
        ReportedError::Preprocess(err) => err.is_internal(),
        ReportedError::Syntax(_) => false,
        ReportedError::Runtime { .. } => untrimmable,
        ReportedError::Internal { .. } => true,
    };
    if internal {
        tracing::debug!(
            target = "ppload.diagnostics",
            frames = frames.len(),
            "failure originates outside the user's program"
        );
    }

    ErrorReport {
        error,
        frames,
        internal,
    }
}

fn substitute_line(mut err: SourceError, sources: &PreprocessedSources) -> SourceError {
    if let Some(text) = sources.ready(&err.path) {
        if let Some(line) = text.line(err.line) {
            err.text = Some(line.to_string());
        }
    }
    err
}
