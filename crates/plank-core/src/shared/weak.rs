use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use super::counter::{CounterState, Counts, SharedCounter};
use super::ptr::SharedPtr;
use super::raw::RawShared;

/// Payload of the companion object shared by all weak pointers to one value.
///
/// The companion is itself a shared pointer (built without weak support);
/// its live count is the number of weak handles plus one for the value.
pub(crate) struct WeakLink {
    counter: NonNull<SharedCounter>,
}

// SAFETY: the counter is only accessed through atomics.
unsafe impl Send for WeakLink {}
// SAFETY: see above.
unsafe impl Sync for WeakLink {}

impl WeakLink {
    pub(crate) fn new(counter: NonNull<SharedCounter>) -> Self {
        Self { counter }
    }
}

/// A non-owning reference to a [`SharedPtr`]'s value.
///
/// Holds one weak count, which keeps the counter (not the value) alive.
/// [`upgrade`](Self::upgrade) succeeds only while the value still has live
/// references; once it has been destroyed it always returns `None`.
pub struct WeakPtr<T> {
    companion: SharedPtr<WeakLink>,
    _marker: PhantomData<T>,
}

// SAFETY: same bounds as `std::sync::Weak<T>`.
unsafe impl<T: Send + Sync> Send for WeakPtr<T> {}
// SAFETY: same bounds as `std::sync::Weak<T>`.
unsafe impl<T: Send + Sync> Sync for WeakPtr<T> {}

impl<T> WeakPtr<T> {
    /// Wraps a companion reference. The caller already added the weak count.
    pub(crate) fn from_companion(companion: SharedPtr<WeakLink>) -> Self {
        Self {
            companion,
            _marker: PhantomData,
        }
    }

    fn counter(&self) -> &SharedCounter {
        // SAFETY: this handle's weak count keeps the counter allocated.
        unsafe { self.companion.counter.as_ref() }
    }

    /// A new live reference if the value has not been destroyed.
    pub fn upgrade(&self) -> Option<SharedPtr<T>> {
        let payload = self.counter().try_increment_live()?;
        let header = NonNull::new(payload as *mut _)?;
        // SAFETY: the conditional increment succeeded against this payload,
        // so the block is live and the new count belongs to us.
        Some(SharedPtr::from_raw(unsafe { RawShared::from_counted(header) }))
    }

    /// Both counts from one snapshot.
    pub fn counts(&self) -> Counts {
        self.counter().counts()
    }

    /// Number of live references to the value.
    pub fn live_count(&self) -> usize {
        self.counts().live
    }

    /// Lifecycle state; never [`CounterState::Dead`] while this handle exists.
    pub fn state(&self) -> CounterState {
        self.counts().state()
    }

    /// Whether both weak pointers refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.companion.counter == other.companion.counter
    }
}

impl<T> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        self.counter().increment_weak();
        Self::from_companion(self.companion.clone())
    }
}

impl<T> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        let counter = self.companion.counter;
        if self.counter().decrement_weak() == CounterState::Dead {
            // SAFETY: this thread made the counter dead; no other reference exists.
            unsafe { SharedCounter::free(counter) };
        }
    }
}

impl<T> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_while_live() {
        let strong = SharedPtr::new(String::from("mix")).unwrap();
        let weak = SharedPtr::weak_pointer(&strong).unwrap();
        assert_eq!(SharedPtr::weak_count(&strong), 1);

        let upgraded = weak.upgrade().unwrap();
        assert_eq!(*upgraded, "mix");
        assert!(SharedPtr::ptr_eq(&strong, &upgraded));
        assert_eq!(weak.live_count(), 2);
    }

    #[test]
    fn upgrade_after_destruction_fails() {
        let strong = SharedPtr::new(7u64).unwrap();
        let weak = SharedPtr::weak_pointer(&strong).unwrap();
        let other = weak.clone();
        assert!(weak.ptr_eq(&other));
        assert_eq!(weak.counts(), Counts { live: 1, weak: 2 });

        drop(strong);
        assert_eq!(weak.state(), CounterState::WeakOnly);
        assert!(weak.upgrade().is_none());
        assert!(other.upgrade().is_none());
    }

    #[test]
    fn weak_outliving_value_is_released() {
        let tracker = std::sync::Arc::new(());
        let weak = {
            let strong = SharedPtr::new(std::sync::Arc::clone(&tracker)).unwrap();
            SharedPtr::weak_pointer(&strong).unwrap()
        };
        // Value dropped with the last live reference, not with the weak one.
        assert_eq!(std::sync::Arc::strong_count(&tracker), 1);
        drop(weak);
    }
}
