//! Process-wide settings for the atomic layer.
//!
//! Settings are applied once with [`configure`], before any tagged word is
//! touched. The first operation that needs a setting fixes the defaults if
//! nothing was configured, after which [`configure`] reports
//! [`Error::AlreadyConfigured`].

use std::sync::OnceLock;

use crate::atomic::CasBackend;
use crate::error::{Error, Result};

/// Number of lock stripes used by the emulated backend unless configured.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Upper bound for [`Settings::lock_stripes`].
pub const MAX_LOCK_STRIPES: usize = 4096;

/// Which compare-and-swap implementation tagged words use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CasBackendPreference {
    /// Native double-width CAS when the CPU has one, otherwise emulated.
    #[default]
    Auto,
    /// Always the native instruction; unavailable targets are an error.
    Native,
    /// Always the lock-striped emulation.
    Emulated,
}

/// What a thread does after losing a compare-and-swap race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentionStrategy {
    /// Retry immediately after a CPU spin hint.
    #[default]
    Spin,
    /// Exponential backoff that eventually yields the thread.
    Backoff,
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// CAS implementation selection.
    pub cas_backend: CasBackendPreference,
    /// Size of the emulated backend's lock table. Must be a power of two.
    pub lock_stripes: usize,
    /// Retry policy for every CAS loop.
    pub contention: ContentionStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cas_backend: CasBackendPreference::Auto,
            lock_stripes: DEFAULT_LOCK_STRIPES,
            contention: ContentionStrategy::Spin,
        }
    }
}

impl Settings {
    /// Checks the settings against this target.
    pub fn validate(&self) -> Result<()> {
        if self.lock_stripes == 0 || !self.lock_stripes.is_power_of_two() {
            return Err(Error::InvalidSettings(
                "lock_stripes must be a non-zero power of two",
            ));
        }
        if self.lock_stripes > MAX_LOCK_STRIPES {
            return Err(Error::InvalidSettings("lock_stripes exceeds 4096"));
        }
        if self.cas_backend == CasBackendPreference::Native && !CasBackend::native_available() {
            return Err(Error::NativeCasUnavailable);
        }
        Ok(())
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Applies process-wide settings.
///
/// Must run before the first tagged-word operation in the process.
pub fn configure(settings: Settings) -> Result<()> {
    settings.validate()?;
    SETTINGS
        .set(settings)
        .map_err(|_| Error::AlreadyConfigured)?;
    #[cfg(feature = "tracing")]
    tracing::debug!("settings applied: {:?}", current());
    Ok(())
}

/// The settings in effect, fixing the defaults if none were configured.
pub fn current() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_stripes() {
        let settings = Settings {
            lock_stripes: 48,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn rejects_zero_and_oversized_stripes() {
        for stripes in [0, MAX_LOCK_STRIPES * 2] {
            let settings = Settings {
                lock_stripes: stripes,
                ..Settings::default()
            };
            assert!(settings.validate().is_err(), "stripes={stripes}");
        }
    }

    #[test]
    fn configure_after_first_use_is_refused() {
        let _ = current();
        assert_eq!(
            configure(Settings::default()),
            Err(Error::AlreadyConfigured)
        );
    }
}
