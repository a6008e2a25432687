//! Configuration loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::Config;

/// Get the default config file path (~/.mailmeet/config.json)
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConfigError::Io("Could not find home directory".to_string()))?;
    Ok(home.join(".mailmeet").join("config.json"))
}

/// Load and validate configuration.
///
/// An explicit path must exist. Without one, `~/.mailmeet/config.json` is
/// read if present and the built-in defaults apply otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            read_config(path)?
        }
        None => {
            let default_path = config_path()?;
            if default_path.exists() {
                read_config(&default_path)?
            } else {
                log::debug!(
                    "No config at {}, using defaults",
                    default_path.display()
                );
                Config::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}
