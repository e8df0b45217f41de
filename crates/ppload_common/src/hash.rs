//! Content hashing for hash-based cache invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A keyed 64-bit XXH3 digest of a source file's bytes.
///
/// Stored little-endian, which is also its layout in cache headers. The
/// key lets separate consumers keep their digests disjoint: a hash taken
/// under one key never matches the same bytes hashed under another.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHash([u8; 8]);

impl SourceHash {
    /// Hashes `data` under `key`.
    pub fn keyed(key: u64, data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64_with_seed(data, key).to_le_bytes())
    }

    /// Reads and hashes the file at `path` under `key`.
    pub fn of_file(key: u64, path: &Path) -> std::io::Result<Self> {
        std::fs::read(path).map(|bytes| Self::keyed(key, &bytes))
    }

    /// Rebuilds a hash from the bytes a header stored.
    pub fn from_raw(raw: [u8; 8]) -> Self {
        Self(raw)
    }

    /// The little-endian bytes written into a header.
    pub fn as_raw(&self) -> [u8; 8] {
        self.0
    }
}

impl fmt::Display for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", u64::from_le_bytes(self.0))
    }
}

impl fmt::Debug for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceHash({self})")
    }
}
