//! Configuration paths and the `config` command.
//!
//! The config file lives at `<tribunal home>/config.toml`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tribunal_jobs::{load_config, TribunalConfig};

pub fn default_config_path() -> PathBuf {
    tribunal_logging::tribunal_home().join("config.toml")
}

pub fn load(path: &Path) -> Result<TribunalConfig> {
    load_config(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Effective configuration rendered for display.
pub fn render(path: &Path) -> Result<String> {
    let config = load(path)?;
    let body = config.to_toml().context("Failed to render config")?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    Ok(format!("# {}\n{}", source, body))
}

pub fn print(path: &Path) -> Result<()> {
    print!("{}", render(path)?);
    Ok(())
}
