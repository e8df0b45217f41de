//! Dependency fingerprints stored in the cache trailer.
//!
//! Timestamp trailers are `[watermark: u64 LE][bincode map path -> mtime]`,
//! hash trailers are `[bincode map path -> hash]`. A trailer is captured right
//! after the preprocessor has read its dependencies, not when the entry is
//! written, so an edit made while the unit compiles still reads as a change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ppload_common::{Mtime, SourceHash};
use ppload_config::InvalidationMode;

use crate::error::CacheError;
use crate::header::{host_file_hash, CacheHeader};

const WATERMARK_LEN: usize = 8;

/// Which kind of fingerprint a trailer holds. Always matches the host header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintMode {
    /// Modification times, compared with `>`.
    Timestamp,
    /// Content hashes, compared for equality.
    Hash,
}

impl FingerprintMode {
    /// Returns the mode headers are written in under `invalidation`.
    pub fn for_invalidation(invalidation: InvalidationMode) -> Self {
        match invalidation {
            InvalidationMode::Timestamp => FingerprintMode::Timestamp,
            InvalidationMode::CheckedHash | InvalidationMode::UncheckedHash => FingerprintMode::Hash,
        }
    }

    /// Returns the mode matching `header`.
    pub fn for_header(header: &CacheHeader) -> Self {
        if header.is_hash_based() {
            FingerprintMode::Hash
        } else {
            FingerprintMode::Timestamp
        }
    }
}

/// The dependency fingerprints appended after a compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trailer {
    /// Per-file modification times plus their maximum.
    Timestamp {
        /// The newest dependency mtime at capture time.
        watermark: Mtime,
        /// Mtime of each dependency at capture time.
        mtimes: BTreeMap<PathBuf, Mtime>,
    },
    /// Per-file content hashes.
    Hash {
        /// Hash of each dependency at capture time.
        hashes: BTreeMap<PathBuf, SourceHash>,
    },
}

impl Trailer {
    /// Fingerprints `dependencies` as they are on disk right now.
    ///
    /// Dependencies that cannot be read are left out.
    pub fn capture(dependencies: &[PathBuf], mode: FingerprintMode) -> Self {
        match mode {
            FingerprintMode::Timestamp => {
                let mtimes: BTreeMap<PathBuf, Mtime> = dependencies
                    .iter()
                    .filter_map(|path| current_mtime(path).map(|m| (path.clone(), m)))
                    .collect();
                let watermark = mtimes.values().copied().max().unwrap_or_default();
                Trailer::Timestamp { watermark, mtimes }
            }
            FingerprintMode::Hash => Trailer::Hash {
                hashes: dependencies
                    .iter()
                    .filter_map(|path| current_hash(path).map(|h| (path.clone(), h)))
                    .collect(),
            },
        }
    }

    /// Returns the mode of this trailer.
    pub fn mode(&self) -> FingerprintMode {
        match self {
            Trailer::Timestamp { .. } => FingerprintMode::Timestamp,
            Trailer::Hash { .. } => FingerprintMode::Hash,
        }
    }

    /// Returns the number of fingerprinted dependencies.
    pub fn len(&self) -> usize {
        match self {
            Trailer::Timestamp { mtimes, .. } => mtimes.len(),
            Trailer::Hash { hashes } => hashes.len(),
        }
    }

    /// Returns `true` if no dependency is fingerprinted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encodes the trailer in its on-disk form.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let config = bincode::config::standard();
        let encoded = match self {
            Trailer::Timestamp { watermark, mtimes } => {
                let map = bincode::serde::encode_to_vec(mtimes, config).map_err(|e| {
                    CacheError::Serialization {
                        reason: e.to_string(),
                    }
                })?;
                let mut out = Vec::with_capacity(WATERMARK_LEN + map.len());
                out.extend_from_slice(&watermark.as_secs().to_le_bytes());
                out.extend_from_slice(&map);
                out
            }
            Trailer::Hash { hashes } => bincode::serde::encode_to_vec(hashes, config)
                .map_err(|e| CacheError::Serialization {
                    reason: e.to_string(),
                })?,
        };
        Ok(encoded)
    }

    /// Decodes a trailer occupying all of `data`.
    ///
    /// Truncated input and trailing garbage are both decode errors.
    pub fn decode(data: &[u8], mode: FingerprintMode) -> Result<Self, CacheError> {
        match mode {
            FingerprintMode::Timestamp => {
                if data.len() < WATERMARK_LEN {
                    return Err(CacheError::Decode {
                        reason: "trailer truncated before watermark".to_string(),
                    });
                }
                let mut raw = [0u8; WATERMARK_LEN];
                raw.copy_from_slice(&data[..WATERMARK_LEN]);
                let watermark = Mtime::from_secs(u64::from_le_bytes(raw));
                let mtimes = decode_map(&data[WATERMARK_LEN..])?;
                Ok(Trailer::Timestamp { watermark, mtimes })
            }
            FingerprintMode::Hash => Ok(Trailer::Hash {
                hashes: decode_map(data)?,
            }),
        }
    }

    /// Returns the first dependency that changed since capture, if any.
    ///
    /// Dependencies that no longer exist or cannot be read are skipped and do
    /// not count against freshness.
    pub fn changed_dependency(&self) -> Option<&Path> {
        match self {
            Trailer::Timestamp { watermark, mtimes } => {
                mtimes.iter().find_map(|(path, stored)| {
                    let current = current_mtime(path)?;
                    if current > *watermark {
                        tracing::debug!(
                            target = "ppload.cache",
                            path = %path.display(),
                            %current,
                            %watermark,
                            "dependency newer than watermark"
                        );
                        return Some(path.as_path());
                    }
                    (current > *stored).then_some(path.as_path())
                })
            }
            Trailer::Hash { hashes } => hashes.iter().find_map(|(path, stored)| {
                let current = current_hash(path)?;
                (current != *stored).then_some(path.as_path())
            }),
        }
    }
}

fn decode_map<V: serde::de::DeserializeOwned>(
    data: &[u8],
) -> Result<BTreeMap<PathBuf, V>, CacheError> {
    let (map, consumed): (BTreeMap<PathBuf, V>, usize) =
        bincode::serde::decode_from_slice(data, bincode::config::standard()).map_err(|e| {
            CacheError::Decode {
                reason: e.to_string(),
            }
        })?;
    if consumed != data.len() {
        return Err(CacheError::Decode {
            reason: format!("{} unexpected bytes after trailer", data.len() - consumed),
        });
    }
    Ok(map)
}

/// Reads the current mtime of a dependency, or `None` if it is gone or unreadable.
fn current_mtime(path: &Path) -> Option<Mtime> {
    match Mtime::of(path) {
        Ok(mtime) => Some(mtime),
        Err(err) => {
            skip_dependency(path, &err);
            None
        }
    }
}

/// Reads the current content hash of a dependency, or `None` if it is gone or unreadable.
fn current_hash(path: &Path) -> Option<SourceHash> {
    match host_file_hash(path) {
        Ok(hash) => Some(hash),
        Err(err) => {
            skip_dependency(path, &err);
            None
        }
    }
}

fn skip_dependency(path: &Path, err: &std::io::Error) {
    tracing::debug!(
        target = "ppload.cache",
        path = %path.display(),
        error = %err,
        "skipping unreadable dependency"
    );
}
