//! Configuration validation.
//!
//! Checks a [`CoreConfig`] against this machine before it is applied, and
//! reports every problem at once rather than the first one.
//!
//! ```rust
//! use plank_config::{CoreConfig, validate_config};
//!
//! let config = CoreConfig { lock_stripes: 100, ..CoreConfig::default() };
//! assert!(validate_config(&config).is_err());
//! ```

use plank_core::CasBackend;
use plank_core::settings::MAX_LOCK_STRIPES;
use thiserror::Error;

use crate::config::{CasBackendSetting, CoreConfig};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The lock table size is zero or not a power of two.
    #[error("lock_stripes must be a non-zero power of two, got {0}")]
    LockStripesNotPowerOfTwo(usize),

    /// The lock table size exceeds the supported maximum.
    #[error("lock_stripes {value} exceeds the maximum of {max}")]
    LockStripesTooLarge {
        /// The configured value.
        value: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// The native backend was requested on a machine without one.
    #[error("cas_backend = \"native\" but this machine has no double-width compare-and-swap")]
    NativeUnavailable,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates every field of `config`.
pub fn validate_config(config: &CoreConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if !config.lock_stripes.is_power_of_two() {
        errors.push(ValidationError::LockStripesNotPowerOfTwo(
            config.lock_stripes,
        ));
    } else if config.lock_stripes > MAX_LOCK_STRIPES {
        errors.push(ValidationError::LockStripesTooLarge {
            value: config.lock_stripes,
            max: MAX_LOCK_STRIPES,
        });
    }

    if config.cas_backend == CasBackendSetting::Native && !CasBackend::native_available() {
        errors.push(ValidationError::NativeUnavailable);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&CoreConfig::default()), Ok(()));
    }

    #[test]
    fn zero_stripes_rejected() {
        let config = CoreConfig {
            lock_stripes: 0,
            ..CoreConfig::default()
        };
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::LockStripesNotPowerOfTwo(0))
        );
    }

    #[test]
    fn oversized_stripes_rejected() {
        let config = CoreConfig {
            lock_stripes: MAX_LOCK_STRIPES * 4,
            ..CoreConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::LockStripesTooLarge { .. })
        ));
    }

    #[test]
    fn native_matches_machine() {
        let config = CoreConfig {
            cas_backend: CasBackendSetting::Native,
            ..CoreConfig::default()
        };
        assert_eq!(
            validate_config(&config).is_ok(),
            CasBackend::native_available()
        );
    }

    #[test]
    fn multiple_errors_display_joined() {
        let err = ValidationError::Multiple(vec![
            ValidationError::LockStripesNotPowerOfTwo(3),
            ValidationError::NativeUnavailable,
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("multiple validation errors: lock_stripes"), "got: {msg}");
        assert!(msg.contains("; cas_backend"), "got: {msg}");
    }
}
