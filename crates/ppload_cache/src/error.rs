//! Cache entry errors.

use std::path::PathBuf;

/// Why a cache entry could not be read, trusted or written.
///
/// Reads are fail-safe: every variant raised while loading an entry ends up
/// as [`Freshness::Stale`](crate::Freshness::Stale) and a recompilation.
/// Only writes surface these errors to the caller, which logs and moves on.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache file or a source it describes could not be accessed.
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The host header is missing, truncated or carries the wrong magic.
    #[error("invalid cache header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The compiled unit or the dependency trailer could not be decoded.
    #[error("failed to decode cache entry: {reason}")]
    Decode {
        /// Description of the decode failure.
        reason: String,
    },

    /// A unit or trailer could not be encoded.
    #[error("failed to encode cache entry: {reason}")]
    Serialization {
        /// What the encoder reported.
        reason: String,
    },

    /// The host's own header check rejected the entry.
    #[error("cache entry is stale for {origin}: {reason}")]
    StaleSource {
        /// The origin file the entry was built from.
        origin: PathBuf,
        /// Which header field did not match.
        reason: String,
    },
}
