use std::sync::OnceLock;

use super::{TaggedValue, WordPair, emulated, native};
use crate::settings::{self, CasBackendPreference};

/// The compare-and-swap implementation in effect for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasBackend {
    /// A double-width hardware instruction.
    Native,
    /// A striped table of locks, one held per compare-and-swap.
    Emulated,
}

static BACKEND: OnceLock<CasBackend> = OnceLock::new();

impl CasBackend {
    /// The backend used by every tagged word, resolved on first call.
    #[inline]
    pub fn current() -> Self {
        *BACKEND.get_or_init(resolve)
    }

    /// Whether this target and CPU provide a native double-width CAS.
    pub fn native_available() -> bool {
        native::is_available()
    }

    /// Short name for logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            CasBackend::Native => "native",
            CasBackend::Emulated => "emulated",
        }
    }
}

fn resolve() -> CasBackend {
    let settings = settings::current();
    let available = native::is_available();
    let backend = match settings.cas_backend {
        CasBackendPreference::Auto | CasBackendPreference::Native if available => {
            CasBackend::Native
        }
        CasBackendPreference::Native => {
            // Validation rejects this combination; reaching it means the CPU
            // check changed answers, so stay on the safe path.
            #[cfg(feature = "tracing")]
            tracing::warn!("native CAS requested but unavailable, using emulated backend");
            CasBackend::Emulated
        }
        CasBackendPreference::Auto | CasBackendPreference::Emulated => CasBackend::Emulated,
    };
    #[cfg(feature = "tracing")]
    tracing::info!(
        backend = backend.name(),
        native_available = available,
        lock_stripes = settings.lock_stripes,
        "tagged word backend selected"
    );
    backend
}

#[inline]
pub(super) fn load(cell: &WordPair) -> TaggedValue {
    match CasBackend::current() {
        // SAFETY: `Native` is only selected when `native::is_available()`.
        CasBackend::Native => unsafe { native::load(cell) },
        CasBackend::Emulated => emulated::load(cell),
    }
}

#[inline]
pub(super) fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    match CasBackend::current() {
        // SAFETY: `Native` is only selected when `native::is_available()`.
        CasBackend::Native => unsafe { native::compare_exchange(cell, current, new) },
        CasBackend::Emulated => emulated::compare_exchange(cell, current, new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable() {
        let first = CasBackend::current();
        for _ in 0..16 {
            assert_eq!(CasBackend::current(), first);
        }
    }

    #[test]
    fn default_settings_prefer_native() {
        // The unit-test binary never configures settings, so Auto applies.
        let expected = if CasBackend::native_available() {
            CasBackend::Native
        } else {
            CasBackend::Emulated
        };
        assert_eq!(CasBackend::current(), expected);
    }
}
