//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::LoaderConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "ppload.toml";

/// Loads and validates `ppload.toml` from a project directory.
///
/// A missing file is not an error: the defaults are returned instead.
pub fn load_config(project_dir: &Path) -> Result<LoaderConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        tracing::debug!(
            target = "ppload.config",
            path = %config_path.display(),
            "no configuration file; using defaults"
        );
        return Ok(LoaderConfig::default());
    }
    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
    load_config_from_str(&content)
}

/// Parses and validates a `ppload.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<LoaderConfig, ConfigError> {
    let config: LoaderConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that the extension family, plain extension and cache naming are consistent.
fn validate_config(config: &LoaderConfig) -> Result<(), ConfigError> {
    if config.extensions.is_empty() {
        return Err(ConfigError::EmptyFamily);
    }
    if let Some(ext) = config
        .extensions
        .iter()
        .chain([&config.plain_extension])
        .find(|ext| ext.is_empty() || ext.starts_with('.'))
    {
        return Err(ConfigError::BadExtension { ext: ext.clone() });
    }
    if config.extensions.contains(&config.plain_extension) {
        return Err(ConfigError::PlainInFamily {
            ext: config.plain_extension.clone(),
        });
    }
    for (field, value) in [
        ("cache_dir_name", &config.cache_dir_name),
        ("cache_tag", &config.cache_tag),
    ] {
        if value.is_empty() {
            return Err(ConfigError::EmptyCacheName { field });
        }
    }
    Ok(())
}
