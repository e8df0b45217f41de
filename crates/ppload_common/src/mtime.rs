//! Whole-second modification times for timestamp-based invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A file modification time in whole seconds since the UNIX epoch.
///
/// Sub-second precision is dropped to match what cache headers store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Mtime(u64);

impl Mtime {
    /// Creates an `Mtime` from raw seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the raw seconds value.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Reads the current modification time of `path` from the filesystem.
    ///
    /// Never cached: every call stats the file again.
    pub fn of(path: &Path) -> io::Result<Self> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(Self::from_system_time(modified, path))
    }

    fn from_system_time(time: SystemTime, path: &Path) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(dur) => Self(dur.as_secs()),
            Err(err) => {
                tracing::debug!(
                    target = "ppload.common",
                    path = %path.display(),
                    error = ?err,
                    "file mtime is before UNIX_EPOCH; using 0"
                );
                Self(0)
            }
        }
    }
}

impl fmt::Display for Mtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl fmt::Debug for Mtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mtime({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};

    #[test]
    fn reads_filesystem_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.ppy");
        std::fs::write(&path, "#define VALUE 1\n").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 500)).unwrap();

        assert_eq!(Mtime::of(&path).unwrap(), Mtime::from_secs(1_700_000_000));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Mtime::of(Path::new("/nonexistent/header.ppy")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn ordering_follows_seconds() {
        assert!(Mtime::from_secs(10) > Mtime::from_secs(9));
        assert_eq!(Mtime::default(), Mtime::from_secs(0));
    }

    #[test]
    fn display_and_debug() {
        assert_eq!(format!("{}", Mtime::from_secs(42)), "42s");
        assert_eq!(format!("{:?}", Mtime::from_secs(42)), "Mtime(42)");
    }
}
