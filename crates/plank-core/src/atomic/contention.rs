use crossbeam_utils::Backoff;

use crate::settings::{self, ContentionStrategy};

/// Retry policy for one CAS loop, chosen from the process settings.
pub(crate) struct Contention {
    backoff: Option<Backoff>,
}

impl Contention {
    pub(crate) fn new() -> Self {
        let backoff = match settings::current().contention {
            ContentionStrategy::Spin => None,
            ContentionStrategy::Backoff => Some(Backoff::new()),
        };
        Self { backoff }
    }

    /// Called after a lost race, before the next attempt.
    #[inline]
    pub(crate) fn retry(&self) {
        match &self.backoff {
            None => core::hint::spin_loop(),
            Some(backoff) => backoff.snooze(),
        }
    }
}
