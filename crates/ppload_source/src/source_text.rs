//! Source text with line-start indexing for fast line lookup.

use std::path::PathBuf;

/// The text of one file, indexed by line.
///
/// Stores the content along with precomputed line-start offsets so that a
/// 1-indexed line number reported by the compiler maps straight to the text
/// of that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// The filesystem path this text belongs to.
    pub path: PathBuf,
    /// The full text content.
    pub content: String,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<usize>,
}

impl SourceText {
    /// Creates a new `SourceText` with precomputed line starts.
    pub fn new(path: impl Into<PathBuf>, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        Self {
            path: path.into(),
            content,
            line_starts,
        }
    }

    /// Returns the number of lines, counting a trailing unterminated line.
    pub fn line_count(&self) -> usize {
        if self.content.ends_with('\n') {
            self.line_starts.len() - 1
        } else {
            self.line_starts.len()
        }
    }

    /// Returns the text of the 1-indexed line `line`, without its line ending.
    pub fn line(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize > self.line_count() {
            return None;
        }
        let idx = line as usize - 1;
        let start = self.line_starts[idx];
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.content.len(), |&next| next - 1);
        let text = &self.content[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}
