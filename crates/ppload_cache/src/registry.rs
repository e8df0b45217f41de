//! Process-wide record of which files each preprocessed origin pulled in.
//!
//! The preprocessor records dependencies under the origin path, fingerprinted
//! as they were when it read them. Once the host has compiled the origin, the
//! entry is re-keyed to the identity of the compiled unit so concurrent
//! recompilations of the same origin cannot mix up their dependency lists.
//! Serializing the unit takes the entry out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::fingerprint::{FingerprintMode, Trailer};

/// Identity of one compiled unit, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    /// Returns the raw identity value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// The files one preprocessing run pulled in, and their fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySnapshot {
    /// Dependencies in the order they were opened.
    pub files: Vec<PathBuf>,
    /// Fingerprints taken right after preprocessing, written as the trailer.
    pub trailer: Trailer,
}

impl DependencySnapshot {
    /// Fingerprints `files` as they are on disk now.
    pub fn capture(files: Vec<PathBuf>, mode: FingerprintMode) -> Self {
        let trailer = Trailer::capture(&files, mode);
        Self { files, trailer }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RegistryKey {
    Origin(PathBuf),
    Unit(UnitId),
}

/// Maps origins, and later compiled units, to their dependency lists.
///
/// Entries whose unit is never serialized stay until the process exits.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    entries: Mutex<HashMap<RegistryKey, DependencySnapshot>>,
    next_id: AtomicU64,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the dependencies of `origin`, replacing any earlier snapshot.
    pub fn record(&self, origin: &Path, dependencies: DependencySnapshot) {
        tracing::trace!(
            target = "ppload.registry",
            origin = %origin.display(),
            dependencies = dependencies.files.len(),
            "recording dependencies"
        );
        self.lock()
            .insert(RegistryKey::Origin(origin.to_path_buf()), dependencies);
    }

    /// Issues a unit identity for a fresh compilation of `origin`.
    ///
    /// If dependencies are recorded under `origin` they move to the new
    /// identity. Otherwise nothing is stored and [`take`](Self::take) will
    /// return `None` for it.
    pub fn bind(&self, origin: &Path) -> UnitId {
        let id = UnitId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.lock();
        if let Some(deps) = entries.remove(&RegistryKey::Origin(origin.to_path_buf())) {
            entries.insert(RegistryKey::Unit(id), deps);
        }
        id
    }

    /// Removes and returns the dependencies bound to `id`.
    pub fn take(&self, id: UnitId) -> Option<DependencySnapshot> {
        self.lock().remove(&RegistryKey::Unit(id))
    }

    /// Returns the dependencies currently bound to `id` without removing them.
    pub fn get(&self, id: UnitId) -> Option<DependencySnapshot> {
        self.lock().get(&RegistryKey::Unit(id)).cloned()
    }

    /// Drops any dependencies still recorded under `origin`.
    pub fn discard(&self, origin: &Path) {
        self.lock().remove(&RegistryKey::Origin(origin.to_path_buf()));
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RegistryKey, DependencySnapshot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
