//! Configuration types deserialized from `ppload.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The loader configuration consumed by every ppload component.
///
/// Every field has a default, so an empty `ppload.toml` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// When both `name.<plain>` and `name.<family>` exist, load the plain one.
    pub prefer_original_over_preprocessed: bool,
    /// Write preprocessed output next to its origin with the plain extension.
    pub persist_preprocessed_text_to_disk: bool,
    /// Run the preprocessor on files outside the extension family too.
    pub preprocess_unrecognized_sources: bool,
    /// Extensions (without the leading dot) of the preprocessed family.
    pub extensions: Vec<String>,
    /// Extension (without the leading dot) of plain, unpreprocessed sources.
    pub plain_extension: String,
    /// How cache entries written by this process are invalidated.
    pub invalidation: InvalidationMode,
    /// When hash-based cache entries are checked against their sources.
    pub check_hash_based_caches: HashCheckPolicy,
    /// Name of the cache directory created next to each origin file.
    pub cache_dir_name: String,
    /// Tag embedded in cache file names, e.g. `main.<tag>.ppc`.
    pub cache_tag: String,
    /// Macros defined before every file is preprocessed.
    pub defines: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            prefer_original_over_preprocessed: false,
            persist_preprocessed_text_to_disk: false,
            preprocess_unrecognized_sources: false,
            extensions: vec!["ppy".to_string()],
            plain_extension: "py".to_string(),
            invalidation: InvalidationMode::default(),
            check_hash_based_caches: HashCheckPolicy::default(),
            cache_dir_name: "__ppcache__".to_string(),
            cache_tag: "ppload-1".to_string(),
            defines: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Returns `true` if `path` belongs to the preprocessed extension family.
    pub fn is_preprocessed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Returns `true` if the preprocessor should run on `path`.
    pub fn should_preprocess(&self, path: &Path) -> bool {
        self.preprocess_unrecognized_sources || self.is_preprocessed(path)
    }

    /// Returns the path the preprocessed text of `origin` is persisted to.
    ///
    /// `src/main.ppy` maps to `src/main.py`.
    pub fn persisted_path(&self, origin: &Path) -> PathBuf {
        origin.with_extension(&self.plain_extension)
    }
}

/// How a freshly written cache entry records the state of its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationMode {
    /// Store modification times; a newer source invalidates the entry.
    #[default]
    Timestamp,
    /// Store content hashes and ask for them to be checked on load.
    CheckedHash,
    /// Store content hashes but only check them when policy says `always`.
    UncheckedHash,
}

/// Host policy for validating hash-based cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashCheckPolicy {
    /// Check only entries written as checked.
    #[default]
    Default,
    /// Check every hash-based entry.
    Always,
    /// Never check hash-based entries.
    Never,
}

impl HashCheckPolicy {
    /// Returns `true` if an entry with the given `checked` flag must be validated.
    pub fn should_check(self, checked: bool) -> bool {
        match self {
            HashCheckPolicy::Default => checked,
            HashCheckPolicy::Always => true,
            HashCheckPolicy::Never => false,
        }
    }
}
