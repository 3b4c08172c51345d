//! Lock-free LIFO stack (Treiber stack).
//!
//! The head is a single tagged word whose payload is the top element's
//! address, `0` when empty. Every push and pop bumps the tag, which is enough
//! to reject a stale snapshot even when the same element comes back to the
//! top.

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicIsize, Ordering};

use crossbeam_epoch as epoch;

use crate::atomic::{Contention, TaggedWord};
use crate::element::{FreeDataFunction, ListElement, OwnedElement};
use crate::error::{Result, TeardownError};

/// A multi-producer, multi-consumer LIFO of [`OwnedElement`]s.
pub struct LockFreeStack {
    head: TaggedWord,
    count: AtomicIsize,
    free_function: Option<FreeDataFunction>,
}

// SAFETY: linked elements are owned by the stack and only touched through atomics.
unsafe impl Send for LockFreeStack {}
// SAFETY: see above.
unsafe impl Sync for LockFreeStack {}

impl LockFreeStack {
    /// Creates an empty stack.
    pub const fn new() -> Self {
        Self {
            head: TaggedWord::new(0, 0),
            count: AtomicIsize::new(0),
            free_function: None,
        }
    }

    /// Creates an empty stack that reclaims data with `free` on clear and drop.
    pub const fn with_free_function(free: FreeDataFunction) -> Self {
        Self {
            head: TaggedWord::new(0, 0),
            count: AtomicIsize::new(0),
            free_function: Some(free),
        }
    }

    /// Replaces the data reclamation callback.
    pub fn set_free_function(&mut self, free: Option<FreeDataFunction>) {
        self.free_function = free;
    }

    /// The data reclamation callback, if any.
    pub fn free_function(&self) -> Option<FreeDataFunction> {
        self.free_function
    }

    /// Pushes `element` on top.
    pub fn push(&self, element: OwnedElement) {
        let _guard = epoch::pin();
        let element = element.into_raw();
        let addr = ListElement::addr(element);
        // SAFETY: the element is ours until the CAS below publishes it.
        let node = unsafe { element.as_ref() };

        let contention = Contention::new();
        loop {
            let head = self.head.load();
            node.next.set(head.payload);
            if self.head.compare_and_swap(head, head.advance(addr)) {
                break;
            }
            contention.retry();
        }
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Pops the top element, or returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<OwnedElement> {
        let _guard = epoch::pin();
        let contention = Contention::new();
        loop {
            let head = self.head.load();
            let top = NonNull::new(head.payload as *mut ListElement)?;
            // SAFETY: `top` was linked when `head` was read; the guard keeps
            // it allocated even if another thread pops and drops it meanwhile.
            let next = unsafe { top.as_ref() }.next.payload();
            if self.head.compare_and_swap(head, head.advance(next)) {
                self.count.fetch_sub(1, Ordering::AcqRel);
                // SAFETY: the successful CAS unlinked `top`, making it ours.
                return Some(unsafe { OwnedElement::from_non_null(top) });
            }
            contention.retry();
        }
    }

    /// Number of elements. May be stale under concurrent use.
    pub fn len(&self) -> usize {
        usize::try_from(self.count.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops every element, passing non-zero data to the free function.
    ///
    /// Stops at the first free function error.
    pub fn clear(&self) -> Result<()> {
        while let Some(element) = self.pop() {
            element.release(self.free_function)?;
        }
        Ok(())
    }

    /// Tears the stack down, refusing if it still holds elements.
    pub fn deinit(self) -> core::result::Result<(), TeardownError<Self>> {
        match self.len() {
            0 => Ok(()),
            len => Err(TeardownError::new(self, len)),
        }
    }
}

impl Default for LockFreeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LockFreeStack {
    fn drop(&mut self) {
        let mut drained = 0usize;
        while let Some(element) = self.pop() {
            drained += 1;
            if let Err(_err) = element.release(self.free_function) {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "free function failed while dropping stack");
            }
        }
        if drained > 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!(drained, "stack dropped while not empty");
        }
    }
}

impl fmt::Debug for LockFreeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeStack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
