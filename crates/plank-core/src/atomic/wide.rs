//! 32-bit targets: both words fit in one `AtomicU64`.

use core::sync::atomic::{AtomicU64, Ordering};

use super::{TaggedValue, WordPair};

pub(super) fn is_available() -> bool {
    true
}

fn as_atomic(cell: &WordPair) -> &AtomicU64 {
    // SAFETY: on 32-bit targets `WordPair` is two `u32` atomics aligned to
    // 8 bytes, which is exactly the size and alignment of `AtomicU64`. All
    // access to the pair goes through this view.
    unsafe { AtomicU64::from_ptr(cell.as_mut_ptr().cast::<u64>()) }
}

fn pack(value: TaggedValue) -> u64 {
    // The payload occupies the lower address.
    let (low, high) = if cfg!(target_endian = "little") {
        (value.payload, value.tag)
    } else {
        (value.tag, value.payload)
    };
    (low as u64) | ((high as u64) << 32)
}

fn unpack(raw: u64) -> TaggedValue {
    let low = (raw & 0xFFFF_FFFF) as usize;
    let high = (raw >> 32) as usize;
    if cfg!(target_endian = "little") {
        TaggedValue::new(low, high)
    } else {
        TaggedValue::new(high, low)
    }
}

/// # Safety
///
/// Always sound; `unsafe` mirrors the other native backends.
#[inline]
pub(super) unsafe fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    as_atomic(cell)
        .compare_exchange(pack(current), pack(new), Ordering::AcqRel, Ordering::Acquire)
        .map(unpack)
        .map_err(unpack)
}

/// # Safety
///
/// Always sound; `unsafe` mirrors the other native backends.
#[inline]
pub(super) unsafe fn load(cell: &WordPair) -> TaggedValue {
    unpack(as_atomic(cell).load(Ordering::Acquire))
}
