//! Tagged atomic words.
//!
//! A [`TaggedWord`] is a `(payload, tag)` pair of machine words that is read
//! and compare-and-swapped as one unit. The payload usually holds a pointer;
//! the tag is a version counter bumped by every successful write so that a
//! value that changed away and back never compares equal to a stale snapshot
//! (the ABA problem).
//!
//! # Backends
//!
//! | Target | Backend |
//! |--------|---------|
//! | x86-64 with `cmpxchg16b` | `lock cmpxchg16b` |
//! | AArch64 | `ldaxp` / `stlxp` exclusive pair |
//! | 32-bit with 64-bit atomics | `AtomicU64` over both words |
//! | anything else, or [`CasBackendPreference::Emulated`] | lock-striped emulation |
//!
//! The backend is resolved once per process (see [`CasBackend::current`]) so a
//! word is never accessed through two different implementations.
//!
//! [`CasBackendPreference::Emulated`]: crate::settings::CasBackendPreference::Emulated

mod backend;
mod contention;
mod emulated;

#[cfg_attr(
    all(target_arch = "x86_64", target_pointer_width = "64"),
    path = "x86_64.rs"
)]
#[cfg_attr(
    all(target_arch = "aarch64", target_pointer_width = "64"),
    path = "aarch64.rs"
)]
#[cfg_attr(
    all(target_pointer_width = "32", target_has_atomic = "64"),
    path = "wide.rs"
)]
#[cfg_attr(
    not(any(
        all(target_arch = "x86_64", target_pointer_width = "64"),
        all(target_arch = "aarch64", target_pointer_width = "64"),
        all(target_pointer_width = "32", target_has_atomic = "64"),
    )),
    path = "unsupported.rs"
)]
mod native;

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

pub use backend::CasBackend;
pub(crate) use contention::Contention;

/// A snapshot of a [`TaggedWord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaggedValue {
    /// The value, usually a pointer.
    pub payload: usize,
    /// The version counter or packed metadata.
    pub tag: usize,
}

impl TaggedValue {
    /// Creates a snapshot from its parts.
    pub const fn new(payload: usize, tag: usize) -> Self {
        Self { payload, tag }
    }

    /// The successor of this snapshot: a new payload with the tag bumped.
    #[inline]
    pub const fn advance(self, payload: usize) -> Self {
        Self {
            payload,
            tag: self.tag.wrapping_add(1),
        }
    }
}

/// Two adjacent words, aligned so double-width instructions can address them.
#[cfg_attr(target_pointer_width = "64", repr(C, align(16)))]
#[cfg_attr(target_pointer_width = "32", repr(C, align(8)))]
#[cfg_attr(
    not(any(target_pointer_width = "64", target_pointer_width = "32")),
    repr(C)
)]
pub(crate) struct WordPair {
    words: [AtomicUsize; 2],
}

impl WordPair {
    const fn new(payload: usize, tag: usize) -> Self {
        Self {
            words: [AtomicUsize::new(payload), AtomicUsize::new(tag)],
        }
    }

    /// Pointer to the first word with provenance over both.
    #[inline]
    // Unused where only the emulated backend exists.
    #[allow(dead_code)]
    fn as_mut_ptr(&self) -> *mut usize {
        core::ptr::from_ref(&self.words).cast::<usize>().cast_mut()
    }

    /// Reads both words separately. Only a snapshot under external exclusion.
    #[inline]
    fn load_pair(&self, order: Ordering) -> TaggedValue {
        TaggedValue::new(self.words[0].load(order), self.words[1].load(order))
    }

    /// Writes both words separately. Only atomic as a pair under external exclusion.
    #[inline]
    fn store_pair(&self, value: TaggedValue, order: Ordering) {
        self.words[0].store(value.payload, order);
        self.words[1].store(value.tag, order);
    }
}

/// An atomically updated `(payload, tag)` pair.
///
/// Every method except the `*_unchecked` family observes or commits both
/// fields together. The unchecked accessors touch one field with a plain
/// atomic load or store: they are racy against concurrent compare-and-swap
/// and are meant for callers that already hold exclusive access or tolerate
/// a stale read.
pub struct TaggedWord {
    cell: WordPair,
}

impl TaggedWord {
    /// Creates a word holding `payload` with the given initial tag.
    pub const fn new(payload: usize, tag: usize) -> Self {
        Self {
            cell: WordPair::new(payload, tag),
        }
    }

    /// Atomic snapshot of both fields.
    #[inline]
    pub fn load(&self) -> TaggedValue {
        backend::load(&self.cell)
    }

    /// The payload, taken from an atomic snapshot.
    #[inline]
    pub fn payload(&self) -> usize {
        self.load().payload
    }

    /// The tag, taken from an atomic snapshot.
    #[inline]
    pub fn tag(&self) -> usize {
        self.load().tag
    }

    /// Replaces `current` with `new` if both fields still match `current`.
    ///
    /// Returns the observed snapshot: `Ok` when the swap happened, `Err` with
    /// the value that prevented it otherwise.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: TaggedValue,
        new: TaggedValue,
    ) -> Result<TaggedValue, TaggedValue> {
        backend::compare_exchange(&self.cell, current, new)
    }

    /// Boolean form of [`compare_exchange`](Self::compare_exchange).
    #[inline]
    pub fn compare_and_swap(&self, current: TaggedValue, new: TaggedValue) -> bool {
        self.compare_exchange(current, new).is_ok()
    }

    /// Applies `f` to the current snapshot until its result commits.
    ///
    /// `f` returning `None` abandons the update; the snapshot it saw is
    /// returned as `Err`. On success the previous snapshot is returned.
    pub fn update<F>(&self, mut f: F) -> Result<TaggedValue, TaggedValue>
    where
        F: FnMut(TaggedValue) -> Option<TaggedValue>,
    {
        let contention = Contention::new();
        let mut current = self.load();
        loop {
            let new = f(current).ok_or(current)?;
            match self.compare_exchange(current, new) {
                Ok(previous) => return Ok(previous),
                Err(observed) => {
                    current = observed;
                    contention.retry();
                }
            }
        }
    }

    /// Stores both fields, returning the previous snapshot.
    pub fn swap_all(&self, new: TaggedValue) -> TaggedValue {
        match self.update(|_| Some(new)) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Stores a new payload and bumps the tag, returning the previous payload.
    pub fn swap(&self, payload: usize) -> usize {
        match self.update(|current| Some(current.advance(payload))) {
            Ok(previous) | Err(previous) => previous.payload,
        }
    }

    /// Stores both fields.
    pub fn set_all(&self, new: TaggedValue) {
        self.swap_all(new);
    }

    /// Stores a new payload and bumps the tag.
    pub fn set(&self, payload: usize) {
        self.swap(payload);
    }

    /// Adds `operand` to the payload (wrapping) and bumps the tag.
    ///
    /// Returns the new payload.
    pub fn add(&self, operand: isize) -> usize {
        let previous = match self.update(|current| {
            Some(current.advance(current.payload.wrapping_add_signed(operand)))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        previous.payload.wrapping_add_signed(operand)
    }

    /// Adds one to the payload; see [`add`](Self::add).
    pub fn increment(&self) -> usize {
        self.add(1)
    }

    /// Subtracts one from the payload; see [`add`](Self::add).
    pub fn decrement(&self) -> usize {
        self.add(-1)
    }

    /// Exchanges the payloads of two words.
    ///
    /// Each word is updated atomically but the exchange as a whole is not:
    /// concurrent writers to `other` can be overwritten.
    pub fn swap_with(&self, other: &TaggedWord) {
        let theirs = other.load();
        let ours = self.swap(theirs.payload);
        other.set(ours);
    }

    /// The payload read without a pair snapshot.
    #[inline]
    pub fn get_unchecked(&self) -> usize {
        self.cell.words[0].load(Ordering::Acquire)
    }

    /// The tag read without a pair snapshot.
    #[inline]
    pub fn tag_unchecked(&self) -> usize {
        self.cell.words[1].load(Ordering::Acquire)
    }

    /// Stores the payload without touching the tag and without a CAS.
    ///
    /// Lost if it races with a compare-and-swap on the same word.
    #[inline]
    pub fn set_unchecked(&self, payload: usize) {
        self.cell.words[0].store(payload, Ordering::Release);
    }
}

impl Default for TaggedWord {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Debug for TaggedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.load();
        f.debug_struct("TaggedWord")
            .field("payload", &format_args!("{:#x}", value.payload))
            .field("tag", &value.tag)
            .finish()
    }
}
