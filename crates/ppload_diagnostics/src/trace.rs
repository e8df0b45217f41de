//! Stack traces captured when a loaded program fails.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One frame of a stack trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// The file the frame's code originated from.
    pub file: PathBuf,
    /// 1-indexed line being executed.
    pub line: u32,
    /// Name of the function executing.
    pub function: String,
}

impl Frame {
    /// Creates a frame.
    pub fn new(file: impl Into<PathBuf>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// A stack trace ordered outermost call first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traceback {
    /// The frames, outermost first.
    pub frames: Vec<Frame>,
}

impl Traceback {
    /// Creates a traceback from frames ordered outermost first.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Returns the frames starting at the first one that belongs to `entry`.
    ///
    /// Everything before it is loader and runner machinery. Returns `None`
    /// when no frame belongs to `entry`.
    pub fn trim_to_entry(&self, entry: &Path) -> Option<&[Frame]> {
        let start = self.frames.iter().position(|f| f.file == entry)?;
        Some(&self.frames[start..])
    }

    /// Returns `true` if the trace has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<Vec<Frame>> for Traceback {
    fn from(frames: Vec<Frame>) -> Self {
        Self::new(frames)
    }
}
