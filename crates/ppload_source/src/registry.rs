//! Thread-safe registry of the last preprocessed text per origin file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::source_text::SourceText;

/// What the registry knows about one origin file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSlot {
    /// Preprocessing started but has not succeeded (still running, or failed).
    /// Readers should fall back to the original file.
    Pending,
    /// The text produced by the last successful preprocessing.
    Ready(Arc<SourceText>),
}

/// Anything that can produce the display text of a source line.
///
/// Implemented by the registry itself (preprocessed text only) and by the
/// loader context (which adds on-disk fallbacks).
pub trait LineSource {
    /// Returns the text of the 1-indexed `line` of `path`, if known.
    fn line(&self, path: &Path, line: u32) -> Option<String>;
}

/// Registry mapping absolute origin paths to their preprocessed text.
///
/// Entries live for the lifetime of the registry and are overwritten each
/// time the same path is preprocessed again.
#[derive(Debug, Default)]
pub struct PreprocessedSources {
    entries: Mutex<HashMap<PathBuf, SourceSlot>>,
}

impl PreprocessedSources {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as being preprocessed, hiding any earlier text.
    pub fn record_attempt(&self, path: &Path) {
        self.lock().insert(path.to_path_buf(), SourceSlot::Pending);
    }

    /// Stores the successfully preprocessed `text` for `path`.
    pub fn record_success(&self, path: &Path, text: String) -> Arc<SourceText> {
        let source = Arc::new(SourceText::new(path, text));
        self.lock()
            .insert(path.to_path_buf(), SourceSlot::Ready(Arc::clone(&source)));
        source
    }

    /// Returns the current slot for `path`, or `None` if it was never preprocessed.
    pub fn lookup(&self, path: &Path) -> Option<SourceSlot> {
        self.lock().get(path).cloned()
    }

    /// Returns the preprocessed text for `path` if the last attempt succeeded.
    pub fn ready(&self, path: &Path) -> Option<Arc<SourceText>> {
        match self.lookup(path)? {
            SourceSlot::Ready(text) => Some(text),
            SourceSlot::Pending => None,
        }
    }

    /// Returns the number of tracked paths.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no path has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, SourceSlot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LineSource for PreprocessedSources {
    fn line(&self, path: &Path, line: u32) -> Option<String> {
        let text = self.ready(path)?;
        let found = text.line(line).map(str::to_string);
        if found.is_none() {
            tracing::debug!(
                target = "ppload.source",
                path = %path.display(),
                line,
                "line out of range for preprocessed text"
            );
        }
        found
    }
}
