//! Subcommands.

pub mod config;
pub mod extract;
pub mod fields;
pub mod models;

use std::path::{Path, PathBuf};

use taxdoc_core::TaxdocConfig;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taxdoc")
        .join("config.json")
}

/// The file `--config` points at, or the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when no file exists.
///
/// An explicit `--config` path must exist. Environment overrides apply last.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<TaxdocConfig> {
    let path = config_path(explicit);

    let config = if path.exists() {
        read_config(&path)?
    } else if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        TaxdocConfig::default()
    };

    Ok(config.with_env_overrides())
}

fn read_config(path: &Path) -> anyhow::Result<TaxdocConfig> {
    TaxdocConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))
}
