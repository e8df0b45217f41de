//! Errors raised while loading `ppload.toml`.

use std::path::PathBuf;

/// Why a `ppload.toml` could not be turned into a [`LoaderConfig`](crate::LoaderConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown or mistyped keys.
    #[error("malformed configuration: {0}")]
    Malformed(#[from] toml::de::Error),

    /// No extensions were listed for preprocessing.
    #[error("`extensions` must name at least one preprocessed extension")]
    EmptyFamily,

    /// An extension is empty or written with a leading dot.
    #[error("invalid extension {ext:?}: expected a bare name such as \"ppy\"")]
    BadExtension {
        /// The extension as written.
        ext: String,
    },

    /// The plain extension is also listed for preprocessing.
    #[error("plain extension {ext:?} cannot also be preprocessed")]
    PlainInFamily {
        /// The conflicting extension.
        ext: String,
    },

    /// A cache naming field is empty.
    #[error("`{field}` must not be empty")]
    EmptyCacheName {
        /// The offending key.
        field: &'static str,
    },
}
