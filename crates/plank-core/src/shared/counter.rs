//! Reference counter for shared objects.
//!
//! One tagged word per object: the payload is the managed block's address,
//! the tag packs the live count into its upper half and the weak count into
//! its lower half. Every transition is one compare-and-swap over both, so the
//! payload is cleared in the same step that takes the live count to zero and
//! no thread can see a dead object with a non-null payload.

use core::ptr::NonNull;

use crate::atomic::{TaggedValue, TaggedWord};
use crate::error::Result;
use crate::memory;

const HALF_BITS: u32 = usize::BITS / 2;
const HALF_MASK: usize = (1 << HALF_BITS) - 1;

/// Largest representable live or weak count. Exceeding it aborts the process.
pub const MAX_COUNT: usize = HALF_MASK;

/// Live and weak reference counts of one shared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    /// Strong references.
    pub live: usize,
    /// Weak references.
    pub weak: usize,
}

impl Counts {
    const fn pack(self) -> usize {
        (self.live << HALF_BITS) | self.weak
    }

    const fn unpack(tag: usize) -> Self {
        Self {
            live: tag >> HALF_BITS,
            weak: tag & HALF_MASK,
        }
    }

    /// The lifecycle state these counts describe.
    pub const fn state(self) -> CounterState {
        if self.live > 0 {
            CounterState::Live
        } else if self.weak > 0 {
            CounterState::WeakOnly
        } else {
            CounterState::Dead
        }
    }
}

/// Lifecycle of a shared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterState {
    /// At least one strong reference; the value is alive.
    Live,
    /// Only weak references remain; the value has been destroyed.
    WeakOnly,
    /// No references remain; the counter itself is released.
    Dead,
}

/// Result of the decrement that took the live count to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LastLive {
    /// The payload that was cleared.
    pub(crate) payload: usize,
    /// `Dead` when no weak references remain and the counter must be freed.
    pub(crate) state: CounterState,
}

pub(crate) struct SharedCounter {
    word: TaggedWord,
}

#[cold]
fn count_overflow() -> ! {
    #[cfg(feature = "tracing")]
    tracing::error!("shared pointer reference count overflow");
    std::process::abort()
}

fn unconditional(result: core::result::Result<TaggedValue, TaggedValue>) -> TaggedValue {
    match result {
        Ok(previous) | Err(previous) => previous,
    }
}

impl SharedCounter {
    /// A counter with one live and no weak references.
    pub(crate) const fn new(payload: usize) -> Self {
        Self {
            word: TaggedWord::new(payload, Counts { live: 1, weak: 0 }.pack()),
        }
    }

    pub(crate) fn allocate(payload: usize) -> Result<NonNull<SharedCounter>> {
        let ptr = memory::allocate::<SharedCounter>()?;
        // SAFETY: freshly allocated for a `SharedCounter`.
        unsafe { ptr.as_ptr().write(Self::new(payload)) };
        Ok(ptr)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`allocate`](Self::allocate), have reached
    /// [`CounterState::Dead`], and not be used again.
    pub(crate) unsafe fn free(ptr: NonNull<SharedCounter>) {
        // SAFETY: forwarded from the caller's contract.
        unsafe {
            ptr.as_ptr().drop_in_place();
            memory::free(ptr);
        }
    }

    pub(crate) fn counts(&self) -> Counts {
        Counts::unpack(self.word.tag())
    }

    pub(crate) fn payload(&self) -> usize {
        self.word.payload()
    }

    /// Adds a live reference. The caller must already hold one.
    pub(crate) fn increment_live(&self) {
        unconditional(self.word.update(|current| {
            let counts = Counts::unpack(current.tag);
            debug_assert!(counts.live > 0, "increment_live on a dead object");
            if counts.live >= MAX_COUNT {
                count_overflow();
            }
            Some(TaggedValue::new(
                current.payload,
                Counts {
                    live: counts.live + 1,
                    ..counts
                }
                .pack(),
            ))
        }));
    }

    /// Adds a live reference only while the payload is still present.
    ///
    /// Returns the payload on success, `None` once the object was destroyed.
    pub(crate) fn try_increment_live(&self) -> Option<usize> {
        self.word
            .update(|current| {
                if current.payload == 0 {
                    return None;
                }
                let counts = Counts::unpack(current.tag);
                if counts.live >= MAX_COUNT {
                    count_overflow();
                }
                Some(TaggedValue::new(
                    current.payload,
                    Counts {
                        live: counts.live + 1,
                        ..counts
                    }
                    .pack(),
                ))
            })
            .ok()
            .map(|previous| previous.payload)
    }

    /// Drops a live reference.
    ///
    /// Returns `Some` exactly once per object: for the decrement that reached
    /// zero, which also cleared the payload.
    pub(crate) fn decrement_live(&self) -> Option<LastLive> {
        let previous = unconditional(self.word.update(|current| {
            let counts = Counts::unpack(current.tag);
            debug_assert!(counts.live > 0, "decrement_live below zero");
            let live = counts.live - 1;
            let payload = if live == 0 { 0 } else { current.payload };
            Some(TaggedValue::new(payload, Counts { live, ..counts }.pack()))
        }));
        let counts = Counts::unpack(previous.tag);
        (counts.live == 1).then(|| LastLive {
            payload: previous.payload,
            state: Counts {
                live: 0,
                weak: counts.weak,
            }
            .state(),
        })
    }

    /// Adds a weak reference. The caller must hold a live or weak reference.
    pub(crate) fn increment_weak(&self) {
        unconditional(self.word.update(|current| {
            let counts = Counts::unpack(current.tag);
            if counts.weak >= MAX_COUNT {
                count_overflow();
            }
            Some(TaggedValue::new(
                current.payload,
                Counts {
                    weak: counts.weak + 1,
                    ..counts
                }
                .pack(),
            ))
        }));
    }

    /// Drops a weak reference, returning the state afterwards.
    ///
    /// `Dead` is returned to exactly one caller, which must free the counter.
    pub(crate) fn decrement_weak(&self) -> CounterState {
        let previous = unconditional(self.word.update(|current| {
            let counts = Counts::unpack(current.tag);
            debug_assert!(counts.weak > 0, "decrement_weak below zero");
            Some(TaggedValue::new(
                current.payload,
                Counts {
                    weak: counts.weak - 1,
                    ..counts
                }
                .pack(),
            ))
        }));
        let counts = Counts::unpack(previous.tag);
        Counts {
            live: counts.live,
            weak: counts.weak - 1,
        }
        .state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn packing_keeps_halves_apart() {
        let counts = Counts {
            live: MAX_COUNT,
            weak: 3,
        };
        assert_eq!(Counts::unpack(counts.pack()), counts);
    }

    #[test]
    fn state_machine() {
        assert_eq!(Counts { live: 2, weak: 0 }.state(), CounterState::Live);
        assert_eq!(Counts { live: 0, weak: 1 }.state(), CounterState::WeakOnly);
        assert_eq!(Counts::default().state(), CounterState::Dead);
    }

    #[test]
    fn last_live_clears_payload() {
        let counter = SharedCounter::new(0x1000);
        counter.increment_live();
        assert_eq!(counter.decrement_live(), None);
        assert_eq!(counter.payload(), 0x1000);

        let last = counter.decrement_live().unwrap();
        assert_eq!(last.payload, 0x1000);
        assert_eq!(last.state, CounterState::Dead);
        assert_eq!(counter.payload(), 0);
    }

    #[test]
    fn weak_reference_defers_death() {
        let counter = SharedCounter::new(0x2000);
        counter.increment_weak();

        let last = counter.decrement_live().unwrap();
        assert_eq!(last.state, CounterState::WeakOnly);
        assert_eq!(counter.try_increment_live(), None);
        assert_eq!(counter.decrement_weak(), CounterState::Dead);
    }

    #[test]
    fn upgrade_while_live() {
        let counter = SharedCounter::new(0x3000);
        assert_eq!(counter.try_increment_live(), Some(0x3000));
        assert_eq!(counter.counts(), Counts { live: 2, weak: 0 });
    }

    #[test]
    fn exactly_one_thread_sees_last_live() {
        const THREADS: usize = 8;
        let counter = Arc::new(SharedCounter::new(0x4000));
        for _ in 1..THREADS {
            counter.increment_live();
        }
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || counter.decrement_live().is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(counter.counts(), Counts::default());
    }
}
