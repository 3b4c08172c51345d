//! `lock cmpxchg16b` backend for x86-64.
//!
//! The instruction is missing from a handful of early x86-64 CPUs, so unless
//! the build already targets it, availability is detected at runtime.

use core::arch::asm;

use super::{TaggedValue, WordPair};

pub(super) fn is_available() -> bool {
    #[cfg(target_feature = "cmpxchg16b")]
    {
        true
    }
    #[cfg(not(target_feature = "cmpxchg16b"))]
    {
        std::arch::is_x86_feature_detected!("cmpxchg16b")
    }
}

/// # Safety
///
/// The CPU must support `cmpxchg16b` (see [`is_available`]).
#[inline]
pub(super) unsafe fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    // SAFETY: `cell` is 16-byte aligned and its words are atomics, so shared
    // writes through the pointer are permitted. CPU support is the caller's
    // contract.
    let (payload, tag, swapped) = unsafe {
        cmpxchg16b(
            cell.as_mut_ptr(),
            current.payload as u64,
            current.tag as u64,
            new.payload as u64,
            new.tag as u64,
        )
    };
    let observed = TaggedValue::new(payload as usize, tag as usize);
    if swapped { Ok(observed) } else { Err(observed) }
}

/// # Safety
///
/// Same as [`compare_exchange`].
#[inline]
pub(super) unsafe fn load(cell: &WordPair) -> TaggedValue {
    // Comparing against zero either fails and reports the pair, or succeeds
    // by writing zero over zero. Both leave the value unchanged.
    let zero = TaggedValue::default();
    // SAFETY: forwarded from the caller's contract.
    match unsafe { compare_exchange(cell, zero, zero) } {
        Ok(value) | Err(value) => value,
    }
}

#[inline]
#[target_feature(enable = "cmpxchg16b")]
unsafe fn cmpxchg16b(
    dst: *mut usize,
    old_lo: u64,
    old_hi: u64,
    new_lo: u64,
    new_hi: u64,
) -> (u64, u64, bool) {
    let prev_lo: u64;
    let prev_hi: u64;
    let swapped: u8;
    // SAFETY: `dst` is valid and 16-byte aligned per the caller. `rbx` is
    // reserved by LLVM, so the new low word is swapped into it around the
    // instruction and restored afterwards. `dst` is pinned to `rdi` so the
    // allocator can never hand it the register being swapped.
    unsafe {
        asm!(
            "xchg {rbx_tmp}, rbx",
            "lock cmpxchg16b xmmword ptr [rdi]",
            "sete {swapped}",
            "mov rbx, {rbx_tmp}",
            in("rdi") dst,
            rbx_tmp = inout(reg) new_lo => _,
            swapped = out(reg_byte) swapped,
            in("rcx") new_hi,
            inout("rax") old_lo => prev_lo,
            inout("rdx") old_hi => prev_hi,
            options(nostack),
        );
    }
    (prev_lo, prev_hi, swapped != 0)
}
