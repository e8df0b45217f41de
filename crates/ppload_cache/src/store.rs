//! On-disk location of cache entries.
//!
//! Entries live at `<origin dir>/<cache dir>/<file name>.<tag>.ppc`, next to
//! the source they were compiled from. The extension stays in the name, so
//! `util.ppy` and `util.py` never share an entry.

use std::path::{Path, PathBuf};

use ppload_config::LoaderConfig;

use crate::error::CacheError;

/// File extension of cache entries.
const CACHE_EXT: &str = "ppc";

/// Reads and writes cache entries beside their origin files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir_name: String,
    tag: String,
}

impl CacheStore {
    /// Creates a store using the cache directory name and tag from `config`.
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            dir_name: config.cache_dir_name.clone(),
            tag: config.cache_tag.clone(),
        }
    }

    /// Returns the cache entry path for `origin`.
    pub fn cache_path(&self, origin: &Path) -> PathBuf {
        let name = origin
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = origin.parent().unwrap_or_else(|| Path::new(""));
        dir.join(&self.dir_name)
            .join(format!("{name}.{}.{CACHE_EXT}", self.tag))
    }

    /// Reads the cache entry for `origin`, or `None` if there is none.
    pub fn read(&self, origin: &Path) -> Option<Vec<u8>> {
        let path = self.cache_path(origin);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(
                        target = "ppload.cache",
                        path = %path.display(),
                        error = %err,
                        "cache entry unreadable"
                    );
                }
                None
            }
        }
    }

    /// Writes the cache entry for `origin`.
    ///
    /// The bytes go to a temporary file first and are renamed into place, so
    /// concurrent readers never observe a partial entry.
    pub fn write(&self, origin: &Path, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.cache_path(origin);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let tmp = path.with_extension(format!("{CACHE_EXT}.{}.tmp", std::process::id()));
        std::fs::write(&tmp, bytes).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CacheError::Io { path, source: e });
        }

        tracing::debug!(
            target = "ppload.cache",
            path = %path.display(),
            bytes = bytes.len(),
            "wrote cache entry"
        );
        Ok(path)
    }

    /// Deletes the cache entry for `origin`, if any.
    pub fn remove(&self, origin: &Path) -> Result<(), CacheError> {
        let path = self.cache_path(origin);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }
}
