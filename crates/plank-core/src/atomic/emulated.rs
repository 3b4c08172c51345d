//! Lock-striped compare-and-swap.
//!
//! Each word pair hashes by address onto one lock from a fixed table; the
//! compare and the write of both words happen while that lock is held. All
//! accesses to a word go through the same stripe, so a pair is never observed
//! half-written.

use core::sync::atomic::Ordering;
use std::sync::OnceLock;

use super::{TaggedValue, WordPair};
use crate::lock::Lock;
use crate::settings;

static STRIPES: OnceLock<Box<[Lock]>> = OnceLock::new();

fn stripes() -> &'static [Lock] {
    STRIPES.get_or_init(|| {
        (0..settings::current().lock_stripes)
            .map(|_| Lock::new())
            .collect()
    })
}

fn stripe_for(cell: &WordPair) -> &'static Lock {
    let stripes = stripes();
    // Pairs are size-aligned, so the low bits of the address carry nothing.
    let slot = core::ptr::from_ref(cell) as usize / core::mem::size_of::<WordPair>();
    &stripes[slot & (stripes.len() - 1)]
}

pub(super) fn load(cell: &WordPair) -> TaggedValue {
    let _guard = stripe_for(cell).lock();
    cell.load_pair(Ordering::Acquire)
}

pub(super) fn compare_exchange(
    cell: &WordPair,
    current: TaggedValue,
    new: TaggedValue,
) -> Result<TaggedValue, TaggedValue> {
    let _guard = stripe_for(cell).lock();
    let observed = cell.load_pair(Ordering::Acquire);
    if observed == current {
        cell.store_pair(new, Ordering::Release);
        Ok(observed)
    } else {
        Err(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn compare_exchange_checks_both_words() {
        let cell = WordPair::new(1, 1);
        assert_eq!(
            compare_exchange(&cell, TaggedValue::new(1, 0), TaggedValue::new(2, 2)),
            Err(TaggedValue::new(1, 1))
        );
        assert_eq!(
            compare_exchange(&cell, TaggedValue::new(1, 1), TaggedValue::new(2, 2)),
            Ok(TaggedValue::new(1, 1))
        );
        assert_eq!(load(&cell), TaggedValue::new(2, 2));
    }

    #[test]
    fn neighbouring_pairs_share_no_state() {
        let cells = [WordPair::new(0, 0), WordPair::new(0, 0)];
        assert!(compare_exchange(&cells[0], TaggedValue::new(0, 0), TaggedValue::new(5, 1)).is_ok());
        assert_eq!(load(&cells[1]), TaggedValue::new(0, 0));
    }

    #[test]
    fn contended_updates_are_not_lost() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 5_000;

        let cell = Arc::new(WordPair::new(0, 0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        let mut current = load(&cell);
                        while let Err(observed) =
                            compare_exchange(&cell, current, current.advance(current.payload + 1))
                        {
                            current = observed;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(load(&cell), TaggedValue::new(THREADS * PER_THREAD, THREADS * PER_THREAD));
    }
}
