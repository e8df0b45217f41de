//! Shared fixtures for loader integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ppload_cache::CompiledUnit;
use ppload_config::LoaderConfig;
use ppload_diagnostics::SourceError;
use ppload_loader::{CompilationContext, Host};
use ppload_preprocess::DirectiveEngine;
use serde::{Deserialize, Serialize};

/// A "compiled" program: the non-blank lines the host accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub origin: PathBuf,
    pub lines: Vec<String>,
}

impl CompiledUnit for Program {
    fn origin(&self) -> &Path {
        &self.origin
    }
}

/// Rejects any line containing `!`, and reports the offending line from the
/// file on disk, the way a compiler that knows nothing of preprocessing would.
#[derive(Default)]
pub struct ToyHost {
    compiles: AtomicUsize,
}

impl ToyHost {
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl Host for ToyHost {
    type Unit = Program;

    fn compile(&self, text: &str, origin: &Path) -> Result<Program, SourceError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let mut lines = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx as u32 + 1;
            if let Some(col) = line.find('!') {
                let mut err = SourceError::new("invalid syntax", origin, line_no, col as u32 + 1);
                err.text = std::fs::read_to_string(origin)
                    .ok()
                    .and_then(|raw| raw.lines().nth(idx).map(str::to_string));
                return Err(err);
            }
            if !line.trim().is_empty() {
                lines.push(line.trim().to_string());
            }
        }
        Ok(Program {
            origin: origin.to_path_buf(),
            lines,
        })
    }
}

pub fn context(config: LoaderConfig) -> CompilationContext<ToyHost> {
    CompilationContext::new(config, ToyHost::default(), Arc::new(DirectiveEngine))
}

/// Writes `content` to `path` and pins its mtime to `secs`.
pub fn write_at(path: &Path, content: &str, secs: i64) {
    std::fs::write(path, content).unwrap();
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}
