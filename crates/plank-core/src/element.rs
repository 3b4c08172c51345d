//! List elements shared by the lock-free queue and stack.
//!
//! An element is a pair of tagged words: the caller's data and the link to
//! the next element. Elements are allocated from the process-wide allocator
//! ([`crate::memory`]). Freeing is deferred through `crossbeam-epoch`:
//! concurrent container operations may still be reading an element that was
//! just popped, so its storage is only returned once every thread pinned at
//! that time has moved on.

use core::fmt;
use core::ptr::NonNull;

use crossbeam_epoch as epoch;

use crate::atomic::TaggedWord;
use crate::error::{Error, Result};
use crate::memory;

/// Callback that reclaims an element's data when a container is cleared.
///
/// Never called for a data word of `0`.
pub type FreeDataFunction = fn(usize) -> Result<()>;

/// A node of an intrusive singly linked list.
///
/// Only reachable through [`OwnedElement`] or a container; the fields are
/// private to the crate.
#[repr(C)]
pub struct ListElement {
    pub(crate) data: TaggedWord,
    pub(crate) next: TaggedWord,
}

impl ListElement {
    pub(crate) const fn new(data: usize) -> Self {
        Self {
            data: TaggedWord::new(data, 0),
            next: TaggedWord::new(0, 0),
        }
    }

    /// Address used as a payload in tagged words.
    #[inline]
    pub(crate) fn addr(ptr: NonNull<ListElement>) -> usize {
        ptr.as_ptr() as usize
    }

    /// Frees `ptr` once no pinned thread can still be reading it.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by [`OwnedElement::with_data`] and must
    /// be unreachable from every container.
    unsafe fn retire(ptr: NonNull<ListElement>) {
        let guard = epoch::pin();
        // SAFETY: the element is unlinked, so only threads pinned before this
        // point can hold it; the closure runs after all of them unpin.
        unsafe {
            guard.defer_unchecked(move || memory::free(ptr));
        }
    }
}

impl fmt::Debug for ListElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListElement")
            .field("data", &self.data)
            .field("next", &self.next)
            .finish()
    }
}

/// Exclusive ownership of one list element.
///
/// Pushing the element into a container moves it in; popping hands it back.
/// Dropping it retires the storage.
pub struct OwnedElement {
    ptr: NonNull<ListElement>,
}

// SAFETY: the element consists of atomics and the handle is its only owner.
unsafe impl Send for OwnedElement {}
// SAFETY: shared access only reads atomics.
unsafe impl Sync for OwnedElement {}

impl OwnedElement {
    /// Allocates an element carrying no data.
    pub fn new() -> Result<Self> {
        Self::with_data(0)
    }

    /// Allocates an element carrying `data`.
    pub fn with_data(data: usize) -> Result<Self> {
        let ptr = memory::allocate::<ListElement>()?;
        // SAFETY: freshly allocated, correctly sized and aligned for `ListElement`.
        unsafe { ptr.as_ptr().write(ListElement::new(data)) };
        Ok(Self { ptr })
    }

    /// The data word.
    pub fn data(&self) -> usize {
        self.element().data.get_unchecked()
    }

    /// Replaces the data word.
    pub fn set_data(&mut self, data: usize) {
        self.element().data.set(data);
    }

    /// Consumes the element, returning its data.
    pub fn into_data(self) -> usize {
        self.data()
    }

    /// Gives up ownership without freeing.
    pub fn into_raw(self) -> NonNull<ListElement> {
        let ptr = self.ptr;
        core::mem::forget(self);
        ptr
    }

    /// Reclaims an element released with [`into_raw`](Self::into_raw).
    ///
    /// # Errors
    ///
    /// [`Error::NullArgument`] if `ptr` is null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`into_raw`](Self::into_raw) and must
    /// not be reclaimed twice.
    pub unsafe fn from_raw(ptr: *mut ListElement) -> Result<Self> {
        NonNull::new(ptr)
            .map(|ptr| Self { ptr })
            .ok_or(Error::NullArgument("element"))
    }

    /// # Safety
    ///
    /// `ptr` must be a heap element no one else owns.
    pub(crate) unsafe fn from_non_null(ptr: NonNull<ListElement>) -> Self {
        Self { ptr }
    }

    fn element(&self) -> &ListElement {
        // SAFETY: owned and live until drop.
        unsafe { self.ptr.as_ref() }
    }

    /// Hands this element's data to `free` (if any) and drops the element.
    pub(crate) fn release(self, free: Option<FreeDataFunction>) -> Result<()> {
        let data = self.into_data();
        match free {
            Some(free) if data != 0 => free(data),
            _ => Ok(()),
        }
    }
}

impl Drop for OwnedElement {
    fn drop(&mut self) {
        // SAFETY: owned elements are never linked into a container.
        unsafe { ListElement::retire(self.ptr) }
    }
}

impl fmt::Debug for OwnedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedElement")
            .field("data", &self.data())
            .finish()
    }
}
