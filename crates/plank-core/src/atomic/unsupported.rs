//! Targets without a double-width CAS. Every word uses the emulated backend.

use super::{TaggedValue, WordPair, emulated};

pub(super) fn is_available() -> bool {
    false
}

/// # Safety
///
/// Never selected because [`is_available`] is `false`; forwards to emulation.
#[inline]
pub(super) unsafe fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    emulated::compare_exchange(cell, current, new)
}

/// # Safety
///
/// See [`compare_exchange`].
#[inline]
pub(super) unsafe fn load(cell: &WordPair) -> TaggedValue {
    emulated::load(cell)
}
