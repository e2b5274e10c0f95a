//! Subcommands of the `factu` binary.

pub mod batch;
pub mod config;
pub mod extract;
pub mod validate;

use std::path::{Path, PathBuf};

use factu_core::models::config::FactuConfig;
use tracing::debug;

/// `<config dir>/factu/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("factu")
        .join("config.json")
}

/// Config file in effect: the explicit path, else the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the explicit config, or the default file when it exists, or defaults.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<FactuConfig> {
    if let Some(path) = explicit {
        return Ok(FactuConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(FactuConfig::from_file(&path)?)
    } else {
        Ok(FactuConfig::default())
    }
}

/// Restrict the ladder to local providers.
pub fn force_offline(config: &mut FactuConfig) {
    config.providers.vision.enabled = false;
    config.providers.ocr_space.enabled = false;
    config.providers.offline.enabled = true;
}
