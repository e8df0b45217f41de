//! Choosing between a plain source and its preprocessed counterpart.

use std::path::{Path, PathBuf};

use crate::types::LoaderConfig;

/// A module source picked by [`resolve_module`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// The file to load.
    pub path: PathBuf,
    /// Whether the file belongs to the preprocessed extension family.
    pub preprocessed: bool,
}

/// Finds the source file for module `name` inside `dir`.
///
/// Family extensions are tried in configuration order. When both a family
/// file and a plain `name.<plain_extension>` file exist, the plain one wins
/// only if `prefer_original_over_preprocessed` is set. Returns `None` when
/// neither exists.
pub fn resolve_module(config: &LoaderConfig, dir: &Path, name: &str) -> Option<ResolvedSource> {
    let preprocessed = config
        .extensions
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
        .map(|path| ResolvedSource {
            path,
            preprocessed: true,
        });

    let plain_path = dir.join(format!("{name}.{}", config.plain_extension));
    let plain = plain_path.is_file().then(|| ResolvedSource {
        path: plain_path,
        preprocessed: false,
    });

    if config.prefer_original_over_preprocessed {
        plain.or(preprocessed)
    } else {
        preprocessed.or(plain)
    }
}
