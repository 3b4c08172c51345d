//! The `core.toml` file format.
//!
//! ```toml
//! cas_backend = "auto"      # auto | native | emulated
//! lock_stripes = 64         # power of two, at most 4096
//! contention = "spin"       # spin | backoff
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;

use plank_core::{CasBackendPreference, ContentionStrategy, Settings};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::validate_config;

/// `cas_backend` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasBackendSetting {
    /// Native when available, otherwise emulated.
    #[default]
    Auto,
    /// Native double-width CAS only.
    Native,
    /// Lock-striped emulation.
    Emulated,
}

impl From<CasBackendSetting> for CasBackendPreference {
    fn from(setting: CasBackendSetting) -> Self {
        match setting {
            CasBackendSetting::Auto => CasBackendPreference::Auto,
            CasBackendSetting::Native => CasBackendPreference::Native,
            CasBackendSetting::Emulated => CasBackendPreference::Emulated,
        }
    }
}

/// `contention` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionSetting {
    /// Retry immediately.
    #[default]
    Spin,
    /// Exponential backoff.
    Backoff,
}

impl From<ContentionSetting> for ContentionStrategy {
    fn from(setting: ContentionSetting) -> Self {
        match setting {
            ContentionSetting::Spin => ContentionStrategy::Spin,
            ContentionSetting::Backoff => ContentionStrategy::Backoff,
        }
    }
}

/// Process-wide settings for `plank-core`, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// CAS implementation selection.
    pub cas_backend: CasBackendSetting,
    /// Lock table size for the emulated backend.
    pub lock_stripes: usize,
    /// Retry policy for CAS loops.
    pub contention: ContentionSetting,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cas_backend: CasBackendSetting::Auto,
            lock_stripes: plank_core::settings::DEFAULT_LOCK_STRIPES,
            contention: ContentionSetting::Spin,
        }
    }
}

impl CoreConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded core config");
        Ok(config)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::debug!(path = %path.display(), "saved core config");
        Ok(())
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The equivalent core settings.
    pub fn to_settings(&self) -> Settings {
        Settings {
            cas_backend: self.cas_backend.into(),
            lock_stripes: self.lock_stripes,
            contention: self.contention.into(),
        }
    }

    /// Validates and installs the configuration as the process-wide settings.
    ///
    /// Must run before the first container or pointer is used.
    pub fn apply(&self) -> Result<(), ConfigError> {
        validate_config(self)?;
        plank_core::configure(self.to_settings())?;
        tracing::debug!(config = ?self, "applied core config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config = CoreConfig::from_toml(
            r#"
            cas_backend = "emulated"
            lock_stripes = 256
            contention = "backoff"
            "#,
        )
        .unwrap();
        assert_eq!(config.cas_backend, CasBackendSetting::Emulated);
        assert_eq!(config.lock_stripes, 256);
        assert_eq!(config.contention, ContentionSetting::Backoff);
    }

    #[test]
    fn missing_keys_default() {
        let config = CoreConfig::from_toml("contention = \"backoff\"").unwrap();
        assert_eq!(config.cas_backend, CasBackendSetting::Auto);
        assert_eq!(config.lock_stripes, 64);
    }

    #[test]
    fn rejects_unknown_backend() {
        let result = CoreConfig::from_toml("cas_backend = \"quantum\"");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn toml_round_trip() {
        let config = CoreConfig {
            cas_backend: CasBackendSetting::Native,
            lock_stripes: 8,
            contention: ContentionSetting::Spin,
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("cas_backend = \"native\""), "got: {text}");
        assert_eq!(CoreConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn to_settings_maps_every_field() {
        let settings = CoreConfig {
            cas_backend: CasBackendSetting::Emulated,
            lock_stripes: 32,
            contention: ContentionSetting::Backoff,
        }
        .to_settings();
        assert_eq!(settings.cas_backend, CasBackendPreference::Emulated);
        assert_eq!(settings.lock_stripes, 32);
        assert_eq!(settings.contention, ContentionStrategy::Backoff);
    }

    #[test]
    fn apply_refuses_invalid_config() {
        let config = CoreConfig {
            lock_stripes: 12,
            ..CoreConfig::default()
        };
        assert!(matches!(config.apply(), Err(ConfigError::Validation(_))));
    }
}
