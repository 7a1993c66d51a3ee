use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory holding `config.toml`; not created until something is saved there.
pub fn shayari_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("shayari-video"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(shayari_config_dir()?.join("config.toml"))
}
