use std::path::{Path, PathBuf};
use std::{env, fs};

use bv_core::UniverseConfig;

use crate::error::Result;

pub const CONFIG_FILE: &str = "universe.toml";
pub const BLOBS_FILE: &str = "blobs.db";
pub const STARMAP_FILE: &str = "starmap.db";

/// Default base directory for all bubble-verse storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".bubble-verse")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the data directory: explicit override > `BV_DATA_DIR` > `~/.bubble-verse`.
pub fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    env::var("BV_DATA_DIR")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_base_dir)
}

/// Parse a `universe.toml` body. Missing keys take their defaults.
pub fn parse_config(content: &str) -> Result<UniverseConfig> {
    Ok(toml::from_str(content)?)
}

/// Load `universe.toml` from `data_dir`, or defaults when the file is absent.
pub fn load_config(data_dir: &Path) -> Result<UniverseConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.is_file() {
        tracing::debug!("no {} in {}, using defaults", CONFIG_FILE, data_dir.display());
        return Ok(UniverseConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(span = config.span, namespace = %config.namespace, "loaded {}", path.display());
    Ok(config)
}
