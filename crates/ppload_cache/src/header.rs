//! The host's native cache header.
//!
//! Layout (16 bytes, little-endian):
//!
//! ```text
//! [magic: 4][flags: u32][mtime: u32][size: u32]   timestamp-based
//! [magic: 4][flags: u32][source hash: 8]          hash-based
//! ```
//!
//! Flag bit 0 marks a hash-based entry, bit 1 asks for the source hash to be
//! checked on load. This format is never altered by the dependency trailer.

use std::path::Path;

use ppload_common::{Mtime, SourceHash};
use ppload_config::InvalidationMode;

use crate::error::CacheError;

/// Magic bytes identifying a ppload cache entry.
pub const CACHE_MAGIC: [u8; 4] = *b"PPL\x01";

/// Length of the host header in bytes.
pub const HEADER_LEN: usize = 16;

const FLAG_HASH_BASED: u32 = 0b01;
const FLAG_CHECK_SOURCE: u32 = 0b10;

/// Key of the host's source hashing primitive.
const HOST_HASH_KEY: u64 = u32::from_le_bytes(CACHE_MAGIC) as u64;

/// Hashes source bytes with the host's keyed primitive.
///
/// Used for both the origin hash in the header and dependency hashes in the
/// trailer.
pub fn host_source_hash(data: &[u8]) -> SourceHash {
    SourceHash::keyed(HOST_HASH_KEY, data)
}

pub(crate) fn host_file_hash(path: &Path) -> std::io::Result<SourceHash> {
    SourceHash::of_file(HOST_HASH_KEY, path)
}

/// The decoded host header of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHeader {
    /// The entry records the origin's mtime and size, both truncated to 32 bits.
    Timestamp {
        /// Origin modification time in seconds, low 32 bits.
        mtime: u32,
        /// Origin size in bytes, low 32 bits.
        size: u32,
    },
    /// The entry records a hash of the origin's raw bytes.
    Hash {
        /// Hash of the origin file.
        hash: SourceHash,
        /// Whether loaders are asked to verify the hash.
        checked: bool,
    },
}

impl CacheHeader {
    /// Builds a timestamp header the way the host does, truncating to 32 bits.
    pub fn timestamp(mtime: Mtime, size: u64) -> Self {
        CacheHeader::Timestamp {
            mtime: mtime.as_secs() as u32,
            size: size as u32,
        }
    }

    /// Builds a hash header.
    pub fn hash(hash: SourceHash, checked: bool) -> Self {
        CacheHeader::Hash { hash, checked }
    }

    /// Builds the header for a fresh entry of `origin` the way the host would.
    ///
    /// The stats always come from the raw file on disk, never from
    /// preprocessed text, so the host's own check stays meaningful.
    pub fn for_origin(origin: &Path, mode: InvalidationMode) -> Result<Self, CacheError> {
        match mode {
            InvalidationMode::Timestamp => {
                let (mtime, size) = origin_stats(origin)?;
                Ok(CacheHeader::timestamp(mtime, size))
            }
            InvalidationMode::CheckedHash | InvalidationMode::UncheckedHash => {
                let hash = host_file_hash(origin).map_err(|source| CacheError::Io {
                    path: origin.to_path_buf(),
                    source,
                })?;
                Ok(CacheHeader::hash(hash, mode == InvalidationMode::CheckedHash))
            }
        }
    }

    /// Returns `true` for hash-based headers.
    pub fn is_hash_based(&self) -> bool {
        matches!(self, CacheHeader::Hash { .. })
    }

    /// Encodes the header into its fixed 16-byte form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&CACHE_MAGIC);
        match *self {
            CacheHeader::Timestamp { mtime, size } => {
                out[4..8].copy_from_slice(&0u32.to_le_bytes());
                out[8..12].copy_from_slice(&mtime.to_le_bytes());
                out[12..16].copy_from_slice(&size.to_le_bytes());
            }
            CacheHeader::Hash { hash, checked } => {
                let mut flags = FLAG_HASH_BASED;
                if checked {
                    flags |= FLAG_CHECK_SOURCE;
                }
                out[4..8].copy_from_slice(&flags.to_le_bytes());
                out[8..16].copy_from_slice(&hash.as_raw());
            }
        }
        out
    }

    /// Decodes the header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, CacheError> {
        if data.len() < HEADER_LEN {
            return Err(CacheError::InvalidHeader {
                reason: format!("expected {HEADER_LEN} bytes, got {}", data.len()),
            });
        }
        if data[..4] != CACHE_MAGIC {
            return Err(CacheError::InvalidHeader {
                reason: "bad magic number".to_string(),
            });
        }
        let flags = read_u32(&data[4..8]);
        if flags & !(FLAG_HASH_BASED | FLAG_CHECK_SOURCE) != 0 {
            return Err(CacheError::InvalidHeader {
                reason: format!("invalid flags {flags:#x}"),
            });
        }
        if flags & FLAG_HASH_BASED != 0 {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[8..16]);
            Ok(CacheHeader::Hash {
                hash: SourceHash::from_raw(raw),
                checked: flags & FLAG_CHECK_SOURCE != 0,
            })
        } else {
            Ok(CacheHeader::Timestamp {
                mtime: read_u32(&data[8..12]),
                size: read_u32(&data[12..16]),
            })
        }
    }

    /// The host's timestamp check: origin mtime and size must both match.
    pub fn validate_timestamp(
        &self,
        origin: &Path,
        source_mtime: Mtime,
        source_size: u64,
    ) -> Result<(), CacheError> {
        let CacheHeader::Timestamp { mtime, size } = *self else {
            return Err(CacheError::InvalidHeader {
                reason: "expected a timestamp-based header".to_string(),
            });
        };
        if mtime != source_mtime.as_secs() as u32 {
            return Err(CacheError::StaleSource {
                origin: origin.to_path_buf(),
                reason: "source mtime changed".to_string(),
            });
        }
        if size != source_size as u32 {
            return Err(CacheError::StaleSource {
                origin: origin.to_path_buf(),
                reason: "source size changed".to_string(),
            });
        }
        Ok(())
    }

    /// The host's hash check: the stored origin hash must match.
    pub fn validate_hash(&self, origin: &Path, source_hash: SourceHash) -> Result<(), CacheError> {
        let CacheHeader::Hash { hash, .. } = *self else {
            return Err(CacheError::InvalidHeader {
                reason: "expected a hash-based header".to_string(),
            });
        };
        if hash != source_hash {
            return Err(CacheError::StaleSource {
                origin: origin.to_path_buf(),
                reason: "source hash changed".to_string(),
            });
        }
        Ok(())
    }
}

/// Returns the origin's mtime and size, as recorded in timestamp headers.
pub(crate) fn origin_stats(origin: &Path) -> Result<(Mtime, u64), CacheError> {
    let io_err = |source| CacheError::Io {
        path: origin.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(origin).map_err(io_err)?.len();
    let mtime = Mtime::of(origin).map_err(io_err)?;
    Ok((mtime, size))
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}
