//! Deciding whether a cached unit can be used as-is.
//!
//! Each load attempt walks
//! `Unvalidated -> HostRejected | HostAccepted -> Fresh | Stale`.
//! The host's header check always runs first; the trailer check only runs
//! for entries the host accepted.

use std::path::{Path, PathBuf};

use ppload_config::LoaderConfig;

use crate::codec::{deserialize, CompiledUnit, TrailerState};
use crate::error::CacheError;
use crate::header::{host_source_hash, origin_stats, CacheHeader};

/// Position of one load attempt in the validation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    /// Nothing has been checked yet.
    Unvalidated,
    /// The host's header check failed.
    HostRejected,
    /// The host's header check passed.
    HostAccepted,
    /// The entry can be used.
    Fresh,
    /// The entry must be recompiled.
    Stale,
}

/// Why a cache entry was rejected.
#[derive(Debug)]
pub enum StaleReason {
    /// The entry could not be decoded at all.
    Decode(CacheError),
    /// The entry holds a unit compiled from a different file.
    OriginMismatch(PathBuf),
    /// The origin file itself could not be read for the header check.
    OriginUnreadable(CacheError),
    /// The host's header check failed.
    HostRejected(CacheError),
    /// A trailer was expected but could not be read.
    TrailerUnreadable(CacheError),
    /// A dependency changed since the entry was written.
    DependencyChanged(PathBuf),
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Decode(err)
            | StaleReason::OriginUnreadable(err)
            | StaleReason::HostRejected(err)
            | StaleReason::TrailerUnreadable(err) => write!(f, "{err}"),
            StaleReason::OriginMismatch(path) => {
                write!(f, "entry was compiled from {}", path.display())
            }
            StaleReason::DependencyChanged(path) => {
                write!(f, "dependency {} changed", path.display())
            }
        }
    }
}

/// Result of validating a cache entry.
#[derive(Debug)]
pub enum Freshness<U> {
    /// The decoded unit, safe to execute without recompiling.
    Fresh(U),
    /// The entry must be discarded and the origin recompiled.
    Stale(StaleReason),
}

impl<U> Freshness<U> {
    /// Returns `true` for [`Freshness::Fresh`].
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh(_))
    }

    /// Returns the unit of a fresh entry.
    pub fn into_unit(self) -> Option<U> {
        match self {
            Freshness::Fresh(unit) => Some(unit),
            Freshness::Stale(_) => None,
        }
    }
}

/// Validates cache entries against the live filesystem.
pub struct StalenessValidator<'a> {
    config: &'a LoaderConfig,
}

impl<'a> StalenessValidator<'a> {
    /// Creates a validator using the given configuration.
    pub fn new(config: &'a LoaderConfig) -> Self {
        Self { config }
    }

    /// Decides whether the entry in `bytes`, cached for `origin`, is fresh.
    ///
    /// Never fails: every problem is reported as [`Freshness::Stale`].
    pub fn validate<U: CompiledUnit>(&self, bytes: &[u8], origin: &Path) -> Freshness<U> {
        let mut attempt = Attempt::new(origin);

        let record = match deserialize::<U>(bytes, self.config) {
            Ok(record) => record,
            Err(err) => return attempt.stale(ValidationState::HostRejected, StaleReason::Decode(err)),
        };
        if record.unit.origin() != origin {
            let found = record.unit.origin().to_path_buf();
            return attempt.stale(ValidationState::HostRejected, StaleReason::OriginMismatch(found));
        }

        match self.host_check(&record.header, origin) {
            HostCheck::Rejected(reason) => {
                return attempt.stale(ValidationState::HostRejected, reason);
            }
            HostCheck::Unchecked => {
                attempt.advance(ValidationState::HostAccepted);
                attempt.advance(ValidationState::Fresh);
                return Freshness::Fresh(record.unit);
            }
            HostCheck::Accepted => attempt.advance(ValidationState::HostAccepted),
        }

        match record.trailer {
            TrailerState::NotExpected => {}
            TrailerState::Unreadable(err) => {
                return attempt.stale(ValidationState::Stale, StaleReason::TrailerUnreadable(err));
            }
            TrailerState::Present(trailer) => {
                if let Some(path) = trailer.changed_dependency() {
                    return attempt.stale(
                        ValidationState::Stale,
                        StaleReason::DependencyChanged(path.to_path_buf()),
                    );
                }
            }
        }

        attempt.advance(ValidationState::Fresh);
        Freshness::Fresh(record.unit)
    }

    /// The host's own single-file check against the origin.
    fn host_check(&self, header: &CacheHeader, origin: &Path) -> HostCheck {
        let result = match *header {
            CacheHeader::Timestamp { .. } => origin_stats(origin)
                .map_err(StaleReason::OriginUnreadable)
                .and_then(|(mtime, size)| {
                    header
                        .validate_timestamp(origin, mtime, size)
                        .map_err(StaleReason::HostRejected)
                }),
            CacheHeader::Hash { checked, .. } => {
                if !self.config.check_hash_based_caches.should_check(checked) {
                    return HostCheck::Unchecked;
                }
                std::fs::read(origin)
                    .map_err(|source| {
                        StaleReason::OriginUnreadable(CacheError::Io {
                            path: origin.to_path_buf(),
                            source,
                        })
                    })
                    .and_then(|bytes| {
                        header
                            .validate_hash(origin, host_source_hash(&bytes))
                            .map_err(StaleReason::HostRejected)
                    })
            }
        };
        match result {
            Ok(()) => HostCheck::Accepted,
            Err(reason) => HostCheck::Rejected(reason),
        }
    }
}

enum HostCheck {
    Accepted,
    /// Hash entry the check policy says not to verify.
    Unchecked,
    Rejected(StaleReason),
}

struct Attempt<'p> {
    origin: &'p Path,
    state: ValidationState,
}

impl<'p> Attempt<'p> {
    fn new(origin: &'p Path) -> Self {
        Self {
            origin,
            state: ValidationState::Unvalidated,
        }
    }

    fn advance(&mut self, next: ValidationState) {
        tracing::trace!(
            target = "ppload.cache",
            origin = %self.origin.display(),
            from = ?self.state,
            to = ?next,
            "validation state"
        );
        self.state = next;
    }

    fn stale<U>(&mut self, next: ValidationState, reason: StaleReason) -> Freshness<U> {
        self.advance(next);
        tracing::debug!(
            target = "ppload.cache",
            origin = %self.origin.display(),
            %reason,
            "cache entry is stale"
        );
        Freshness::Stale(reason)
    }
}
