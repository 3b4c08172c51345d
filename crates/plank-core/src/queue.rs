//! Lock-free FIFO queue.
//!
//! A Michael-Scott queue with a permanently owned dummy element. Every
//! element's `next` link ends in a sentinel equal to the address of the
//! queue's head word rather than null, so "no successor" is an ordinary tagged value that can be
//! compare-and-swapped. Popping the dummy re-links it at the tail and retries;
//! the dummy is never handed out.
//!
//! Head and tail are tagged words, and every write bumps the tag, so a pointer
//! that was popped and pushed again never matches a stale snapshot. Element
//! storage is reclaimed through `crossbeam-epoch`.

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicIsize, Ordering};

use crossbeam_epoch::{self as epoch, Guard};

use crate::atomic::{Contention, TaggedValue, TaggedWord};
use crate::element::{FreeDataFunction, ListElement, OwnedElement};
use crate::error::{Result, TeardownError};

/// `head` must stay the first field: its address is the end-of-list
/// sentinel, and no element (the dummy included) may share it.
#[repr(C)]
struct QueueInner {
    head: TaggedWord,
    tail: TaggedWord,
    count: AtomicIsize,
    dummy: ListElement,
    free_function: Option<FreeDataFunction>,
}

/// What a consistent snapshot of head, tail and the head's successor says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadState {
    /// Head and tail coincide and nothing follows them.
    Empty,
    /// Head and tail coincide but a successor was linked; tail must advance.
    TailLagging { tail: TaggedValue, next: usize },
    /// Head can be unlinked by moving it to `next`.
    Ready { head: TaggedValue, next: usize },
    /// The snapshot was torn by a concurrent operation.
    Inconsistent,
}

/// A multi-producer, multi-consumer FIFO of [`OwnedElement`]s.
///
/// `push` and `pop` never block and never fail; contention is resolved by
/// retrying. Order is FIFO with respect to completion.
pub struct LockFreeQueue {
    inner: NonNull<QueueInner>,
}

// SAFETY: all shared state is atomic; elements are owned by the queue while linked.
unsafe impl Send for LockFreeQueue {}
// SAFETY: see above.
unsafe impl Sync for LockFreeQueue {}

impl LockFreeQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let inner = Box::into_raw(Box::new(QueueInner {
            head: TaggedWord::default(),
            tail: TaggedWord::default(),
            count: AtomicIsize::new(0),
            dummy: ListElement::new(0),
            free_function: None,
        }));
        // SAFETY: `Box::into_raw` never returns null.
        let inner = unsafe { NonNull::new_unchecked(inner) };

        let queue = Self { inner };
        let inner = queue.inner();
        let dummy = ListElement::addr(queue.dummy());
        inner.head.set_all(TaggedValue::new(dummy, 0));
        inner.tail.set_all(TaggedValue::new(dummy, 0));
        inner.dummy.next.set_all(TaggedValue::new(queue.sentinel(), 0));
        queue
    }

    /// Creates an empty queue that reclaims data with `free` on clear and drop.
    pub fn with_free_function(free: FreeDataFunction) -> Self {
        let mut queue = Self::new();
        queue.set_free_function(Some(free));
        queue
    }

    /// Replaces the data reclamation callback.
    pub fn set_free_function(&mut self, free: Option<FreeDataFunction>) {
        // SAFETY: `&mut self` excludes every other access to the inner block.
        unsafe { self.inner.as_mut().free_function = free };
    }

    /// The data reclamation callback, if any.
    pub fn free_function(&self) -> Option<FreeDataFunction> {
        self.inner().free_function
    }

    /// Appends `element` at the tail.
    pub fn push(&self, element: OwnedElement) {
        let guard = epoch::pin();
        self.link(element.into_raw(), &guard);
        self.inner().count.fetch_add(1, Ordering::AcqRel);
    }

    /// Removes the element at the head, or returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<OwnedElement> {
        let guard = epoch::pin();
        let dummy = self.dummy();
        loop {
            let popped = self.unlink(&guard)?;
            if popped == dummy {
                self.link(dummy, &guard);
                continue;
            }
            self.inner().count.fetch_sub(1, Ordering::AcqRel);
            // SAFETY: unlinking transferred exclusive ownership of a heap element.
            return Some(unsafe { OwnedElement::from_non_null(popped) });
        }
    }

    /// Number of elements. May be stale under concurrent use.
    pub fn len(&self) -> usize {
        usize::try_from(self.inner().count.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops every element, passing non-zero data to the free function.
    ///
    /// Stops at the first free function error; elements not yet popped stay
    /// in the queue.
    pub fn clear(&self) -> Result<()> {
        let free = self.free_function();
        while let Some(element) = self.pop() {
            element.release(free)?;
        }
        Ok(())
    }

    /// Tears the queue down, refusing if it still holds elements.
    pub fn deinit(self) -> core::result::Result<(), TeardownError<Self>> {
        match self.len() {
            0 => Ok(()),
            len => Err(TeardownError::new(self, len)),
        }
    }

    #[inline]
    fn inner(&self) -> &QueueInner {
        // SAFETY: the inner block lives until `drop`.
        unsafe { self.inner.as_ref() }
    }

    #[inline]
    fn dummy(&self) -> NonNull<ListElement> {
        NonNull::from(&self.inner().dummy)
    }

    /// End-of-list marker: the address of the head word, which is never an
    /// element address.
    #[inline]
    fn sentinel(&self) -> usize {
        core::ptr::from_ref(&self.inner().head) as usize
    }

    fn link(&self, element: NonNull<ListElement>, _guard: &Guard) {
        let inner = self.inner();
        let sentinel = self.sentinel();
        let addr = ListElement::addr(element);
        // SAFETY: the caller owns `element` until it is linked.
        unsafe { element.as_ref() }.next.set(sentinel);

        let contention = Contention::new();
        loop {
            let tail = inner.tail.load();
            // SAFETY: tail always references the dummy or a linked element,
            // and the guard keeps retired elements allocated.
            let last = unsafe { &*(tail.payload as *const ListElement) };
            let next = last.next.load();
            if inner.tail.load() == tail {
                if next.payload == sentinel {
                    if last.next.compare_and_swap(next, next.advance(addr)) {
                        // Best effort; a lagging tail is advanced by the next operation.
                        inner.tail.compare_and_swap(tail, tail.advance(addr));
                        return;
                    }
                } else {
                    inner.tail.compare_and_swap(tail, tail.advance(next.payload));
                }
            }
            contention.retry();
        }
    }

    fn unlink(&self, guard: &Guard) -> Option<NonNull<ListElement>> {
        let inner = self.inner();
        let contention = Contention::new();
        loop {
            match self.classify(guard) {
                HeadState::Empty => return None,
                HeadState::TailLagging { tail, next } => {
                    inner.tail.compare_and_swap(tail, tail.advance(next));
                }
                HeadState::Ready { head, next } => {
                    if inner.head.compare_and_swap(head, head.advance(next)) {
                        return NonNull::new(head.payload as *mut ListElement);
                    }
                }
                HeadState::Inconsistent => {}
            }
            contention.retry();
        }
    }

    fn classify(&self, _guard: &Guard) -> HeadState {
        let inner = self.inner();
        let sentinel = self.sentinel();
        let head = inner.head.load();
        let tail = inner.tail.load();
        // SAFETY: head always references the dummy or a linked element, and
        // the guard keeps retired elements allocated.
        let first = unsafe { &*(head.payload as *const ListElement) };
        let next = first.next.payload();

        if inner.head.load() != head {
            HeadState::Inconsistent
        } else if head.payload == tail.payload {
            if next == sentinel {
                HeadState::Empty
            } else {
                HeadState::TailLagging { tail, next }
            }
        } else if next != sentinel {
            HeadState::Ready { head, next }
        } else {
            HeadState::Inconsistent
        }
    }
}

impl Default for LockFreeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LockFreeQueue {
    fn drop(&mut self) {
        let free = self.free_function();
        let mut drained = 0usize;
        while let Some(element) = self.pop() {
            drained += 1;
            if let Err(_err) = element.release(free) {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "free function failed while dropping queue");
            }
        }
        if drained > 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!(drained, "queue dropped while not empty");
        }
        // SAFETY: allocated with `Box::into_raw` in `new`; no element still
        // links to the dummy and `&mut self` excludes concurrent operations.
        drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
    }
}

impl fmt::Debug for LockFreeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
