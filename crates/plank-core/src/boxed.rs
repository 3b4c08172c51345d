//! Typed containers that move boxed values between threads.
//!
//! [`BoxedQueue`] and [`BoxedStack`] store a `Box<T>` pointer in each
//! element's data word. Values still queued when the container is cleared or
//! dropped are dropped with it.
//!
//! ```rust
//! use plank_core::BoxedQueue;
//!
//! let files: BoxedQueue<String> = BoxedQueue::new();
//! files.push("take1.wav".to_owned()).unwrap();
//! files.push("take2.wav".to_owned()).unwrap();
//! assert_eq!(files.pop().as_deref(), Some("take1.wav"));
//! ```

use core::fmt;
use core::marker::PhantomData;

use crate::element::OwnedElement;
use crate::error::Result;
use crate::queue::LockFreeQueue;
use crate::stack::LockFreeStack;

fn drop_box<T>(data: usize) -> Result<()> {
    // SAFETY: boxed containers only store pointers produced by `into_data::<T>`.
    drop(unsafe { Box::from_raw(data as *mut T) });
    Ok(())
}

fn into_element<T>(value: T) -> Result<OwnedElement> {
    let data = Box::into_raw(Box::new(value)) as usize;
    OwnedElement::with_data(data).inspect_err(|_| {
        // `drop_box` is infallible.
        let _ = drop_box::<T>(data);
    })
}

fn from_element<T>(element: OwnedElement) -> T {
    let data = element.into_data();
    // SAFETY: the element was created by `into_element::<T>` and its data is
    // reclaimed exactly once, here.
    *unsafe { Box::from_raw(data as *mut T) }
}

/// A lock-free FIFO of `T` values.
pub struct BoxedQueue<T> {
    queue: LockFreeQueue,
    _marker: PhantomData<T>,
}

// SAFETY: values only move between threads, never shared.
unsafe impl<T: Send> Send for BoxedQueue<T> {}
// SAFETY: `&BoxedQueue` only moves values in and out.
unsafe impl<T: Send> Sync for BoxedQueue<T> {}

impl<T> BoxedQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            queue: LockFreeQueue::with_free_function(drop_box::<T>),
            _marker: PhantomData,
        }
    }

    /// Appends `value`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`](crate::Error::OutOfMemory) if the element
    /// could not be allocated; `value` is dropped.
    pub fn push(&self, value: T) -> Result<()> {
        self.queue.push(into_element(value)?);
        Ok(())
    }

    /// Removes the oldest value.
    pub fn pop(&self) -> Option<T> {
        self.queue.pop().map(from_element)
    }

    /// Number of queued values. May be stale under concurrent use.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued value.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> Default for BoxedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BoxedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// A lock-free LIFO of `T` values.
pub struct BoxedStack<T> {
    stack: LockFreeStack,
    _marker: PhantomData<T>,
}

// SAFETY: values only move between threads, never shared.
unsafe impl<T: Send> Send for BoxedStack<T> {}
// SAFETY: `&BoxedStack` only moves values in and out.
unsafe impl<T: Send> Sync for BoxedStack<T> {}

impl<T> BoxedStack<T> {
    /// Creates an empty stack.
    pub const fn new() -> Self {
        Self {
            stack: LockFreeStack::with_free_function(drop_box::<T>),
            _marker: PhantomData,
        }
    }

    /// Pushes `value` on top.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`](crate::Error::OutOfMemory) if the element
    /// could not be allocated; `value` is dropped.
    pub fn push(&self, value: T) -> Result<()> {
        self.stack.push(into_element(value)?);
        Ok(())
    }

    /// Removes the newest value.
    pub fn pop(&self) -> Option<T> {
        self.stack.pop().map(from_element)
    }

    /// Number of stacked values. May be stale under concurrent use.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drops every stacked value.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> Default for BoxedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BoxedStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedStack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
