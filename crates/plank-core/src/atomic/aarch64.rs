//! Exclusive-pair backend for AArch64.
//!
//! `ldaxp`/`stlxp` are part of the base ARMv8-A ISA, so there is nothing to
//! detect at runtime.

use core::arch::asm;

use super::{TaggedValue, WordPair};

pub(super) fn is_available() -> bool {
    true
}

/// # Safety
///
/// Always sound on AArch64; `unsafe` mirrors the other native backends.
#[inline]
pub(super) unsafe fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    let dst = cell.as_mut_ptr();
    let prev_lo: u64;
    let prev_hi: u64;
    let failed: u32;
    // SAFETY: `dst` points at two aligned atomic words owned by `cell`. On a
    // mismatch the observed pair is stored back so the exclusive monitor is
    // released with a write, which also gives the failure path acquire-release
    // ordering.
    unsafe {
        asm!(
            "2:",
            "ldaxp {prev_lo}, {prev_hi}, [{dst}]",
            "cmp {prev_lo}, {old_lo}",
            "ccmp {prev_hi}, {old_hi}, #0, eq",
            "b.ne 3f",
            "stlxp {failed:w}, {new_lo}, {new_hi}, [{dst}]",
            "cbnz {failed:w}, 2b",
            "b 4f",
            "3:",
            "stlxp {failed:w}, {prev_lo}, {prev_hi}, [{dst}]",
            "cbnz {failed:w}, 2b",
            "mov {failed:w}, #1",
            "4:",
            dst = in(reg) dst,
            old_lo = in(reg) current.payload as u64,
            old_hi = in(reg) current.tag as u64,
            new_lo = in(reg) new.payload as u64,
            new_hi = in(reg) new.tag as u64,
            prev_lo = out(reg) prev_lo,
            prev_hi = out(reg) prev_hi,
            failed = out(reg) failed,
            options(nostack),
        );
    }
    let observed = TaggedValue::new(prev_lo as usize, prev_hi as usize);
    if failed == 0 { Ok(observed) } else { Err(observed) }
}

/// # Safety
///
/// See [`compare_exchange`].
#[inline]
pub(super) unsafe fn load(cell: &WordPair) -> TaggedValue {
    let zero = TaggedValue::default();
    // SAFETY: forwarded from the caller's contract.
    match unsafe { compare_exchange(cell, zero, zero) } {
        Ok(value) | Err(value) => value,
    }
}
