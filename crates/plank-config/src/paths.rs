//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/plank/core.toml`
//! - macOS: `~/Library/Application Support/plank/core.toml`
//! - Windows: `%APPDATA%\plank\core.toml`

use std::path::{Path, PathBuf};

use crate::config::CoreConfig;
use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "plank";

/// File name of the core settings.
const CONFIG_FILE: &str = "core.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the user's `core.toml`.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Creates the user configuration directory if needed and returns it.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    Ok(dir)
}

/// Loads `path` if it exists, otherwise returns the default configuration.
///
/// A file that exists but cannot be read or parsed is still an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<CoreConfig, ConfigError> {
    let path = path.as_ref();
    if path.is_file() {
        CoreConfig::load(path)
    } else {
        tracing::debug!(path = %path.display(), "no core config, using defaults");
        Ok(CoreConfig::default())
    }
}
