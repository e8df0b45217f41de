//! Running a macro engine on behalf of the loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ppload_cache::{DependencyRegistry, DependencySnapshot, FingerprintMode};
use ppload_diagnostics::{PreprocessError, SourceError};
use ppload_source::{PreprocessedSources, SourceText};

use crate::engine::{EngineFault, MacroEngine, UNTERMINATED};
use crate::state::MacroState;

/// Whether the engine runs for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Expand macros.
    Enabled,
    /// Return the text unchanged with no dependencies.
    Disabled,
}

/// Successfully preprocessed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    /// The text handed to the host compiler.
    pub text: String,
    /// Files pulled in while preprocessing, in the order they were opened.
    pub dependencies: Vec<PathBuf>,
}

/// Adapts a [`MacroEngine`] to the loader's needs.
#[derive(Clone)]
pub struct Preprocessor {
    engine: Arc<dyn MacroEngine>,
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor").finish_non_exhaustive()
    }
}

impl Preprocessor {
    /// Creates an adapter around `engine`.
    pub fn new(engine: Arc<dyn MacroEngine>) -> Self {
        Self { engine }
    }

    /// Preprocesses `text` read from `origin`.
    ///
    /// On failure `state` is left exactly as it was before the call.
    pub fn preprocess(
        &self,
        text: &str,
        origin: &Path,
        state: &mut MacroState,
        mode: Mode,
    ) -> Result<Preprocessed, PreprocessError> {
        if mode == Mode::Disabled {
            return Ok(Preprocessed {
                text: text.to_string(),
                dependencies: Vec::new(),
            });
        }

        let snapshot = state.clone();
        let result = self
            .engine
            .expand(text, origin, state)
            .map_err(|fault| fault_to_error(fault, text, origin))
            .and_then(|expansion| {
                if expansion.exit_code != 0 {
                    return Err(PreprocessError::NonZeroExit {
                        code: expansion.exit_code,
                    });
                }
                let (input_lines, output_lines) = (line_count(text), line_count(&expansion.text));
                if input_lines != output_lines {
                    return Err(PreprocessError::Internal {
                        message: format!(
                            "engine produced {output_lines} lines from {input_lines} input lines"
                        ),
                        location: None,
                    });
                }
                Ok(Preprocessed {
                    text: expansion.text,
                    dependencies: expansion.includes,
                })
            });

        if let Err(err) = &result {
            *state = snapshot;
            tracing::debug!(
                target = "ppload.preprocess",
                origin = %origin.display(),
                error = %err,
                "preprocessing failed; macro state restored"
            );
        }
        result
    }

    /// Preprocesses a snippet of interactive or evaluated input.
    ///
    /// Returns `Ok(None)` when the snippet ends inside an open conditional,
    /// so the caller can read more lines and retry with the whole buffer.
    /// `state` is untouched in that case. No trailing newline is added to
    /// text that did not end with one.
    pub fn preprocess_snippet(
        &self,
        text: &str,
        name: &Path,
        state: &mut MacroState,
        mode: Mode,
    ) -> Result<Option<String>, PreprocessError> {
        let had_newline = text.ends_with('\n');
        let mut out = match self.preprocess(text, name, state, mode) {
            Ok(preprocessed) => preprocessed.text,
            Err(err) if is_unterminated(&err) => {
                tracing::trace!(
                    target = "ppload.preprocess",
                    name = %name.display(),
                    "snippet is incomplete"
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if !had_newline {
            let trimmed = out.trim_end_matches('\n').len();
            out.truncate(trimmed);
        }
        Ok(Some(out))
    }

    /// Preprocesses a file being loaded and records the outcome.
    ///
    /// The origin is marked in progress in `sources` before the engine runs.
    /// On success its dependencies go to `registry`, fingerprinted in `mode`
    /// as soon as the engine returns, and its text goes to `sources`. On
    /// failure it stays marked in progress.
    pub fn preprocess_for_load(
        &self,
        text: &str,
        origin: &Path,
        state: &mut MacroState,
        mode: FingerprintMode,
        registry: &DependencyRegistry,
        sources: &PreprocessedSources,
    ) -> Result<Preprocessed, PreprocessError> {
        sources.record_attempt(origin);
        match self.preprocess(text, origin, state, Mode::Enabled) {
            Ok(preprocessed) => {
                let snapshot = DependencySnapshot::capture(preprocessed.dependencies.clone(), mode);
                registry.record(origin, snapshot);
                sources.record_success(origin, preprocessed.text.clone());
                Ok(preprocessed)
            }
            Err(err) => {
                registry.discard(origin);
                Err(err)
            }
        }
    }
}

fn is_unterminated(err: &PreprocessError) -> bool {
    matches!(err, PreprocessError::Source(source) if source.message.starts_with(UNTERMINATED))
}

fn line_count(text: &str) -> usize {
    text.split_inclusive('\n').count()
}

fn fault_to_error(fault: EngineFault, text: &str, origin: &Path) -> PreprocessError {
    match fault {
        EngineFault::Directive {
            path,
            line,
            column,
            message,
        } => {
            let line_text = if path == origin {
                SourceText::new(origin, text.to_string())
                    .line(line)
                    .map(str::to_string)
            } else {
                std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| SourceText::new(&path, content).line(line).map(str::to_string))
            };
            let mut err = SourceError::new(message, path, line, column);
            err.text = line_text;
            PreprocessError::Source(err)
        }
        EngineFault::Internal {
            message,
            last_directive,
        } => PreprocessError::Internal {
            message,
            location: last_directive,
        },
    }
}
