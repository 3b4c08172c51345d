//! Type-erased shared block: header, value storage and the owning handle.

use core::any::TypeId;
use core::ptr::NonNull;

use super::counter::{CounterState, SharedCounter};
use super::weak::WeakLink;
use super::SharedPtr;
use crate::error::Result;
use crate::memory;

/// Called once with the value when the last live reference is dropped.
pub type DeinitFunction<T> = fn(&mut T);

/// Called once with the freshly built value; an error fails construction.
pub type InitFunction<T> = fn(&mut T) -> Result<()>;

/// Common prefix of every block, whatever the value type.
pub(crate) struct Header {
    pub(crate) size: usize,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) counter: NonNull<SharedCounter>,
    destroy: unsafe fn(NonNull<Header>),
    /// Companion handed to weak pointers; `None` when weak support is off.
    pub(crate) weak: Option<SharedPtr<WeakLink>>,
}

#[repr(C)]
struct Block<T> {
    header: Header,
    deinit: Option<DeinitFunction<T>>,
    value: T,
}

/// Runs deinit, drops the value, frees the block and releases the companion.
///
/// # Safety
///
/// `header` must head a `Block<T>` whose live count just reached zero.
unsafe fn destroy<T>(header: NonNull<Header>) {
    let block = header.cast::<Block<T>>();
    // SAFETY: the last live reference is gone, so this is the only access.
    let companion = unsafe {
        let inner = &mut *block.as_ptr();
        if let Some(deinit) = inner.deinit {
            deinit(&mut inner.value);
        }
        core::ptr::drop_in_place(&mut inner.value);
        inner.header.weak.take()
    };
    // SAFETY: the value is gone and nothing references the block.
    unsafe { memory::free(block) };
    drop(companion);
}

/// One live reference to a block of unknown type.
pub(crate) struct RawShared {
    header: NonNull<Header>,
}

impl RawShared {
    /// Allocates a block and its counter. The live count starts at one.
    pub(crate) fn allocate<T: 'static>(
        value: T,
        deinit: Option<DeinitFunction<T>>,
        weak: bool,
    ) -> Result<Self> {
        let block = memory::allocate::<Block<T>>()?;
        let header = block.cast::<Header>();
        let counter = match SharedCounter::allocate(header.as_ptr() as usize) {
            Ok(counter) => counter,
            Err(err) => {
                // SAFETY: the block was never initialized or published.
                unsafe { memory::free(block) };
                return Err(err);
            }
        };
        let companion = if weak {
            match SharedPtr::builder(WeakLink::new(counter)).without_weak().build() {
                Ok(companion) => Some(companion),
                Err(err) => {
                    // SAFETY: neither allocation was published.
                    unsafe {
                        SharedCounter::free(counter);
                        memory::free(block);
                    }
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let header_value = Header {
            size: core::mem::size_of::<T>(),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            counter,
            destroy: destroy::<T>,
            weak: companion,
        };
        // SAFETY: `block` is allocated for a `Block<T>` and not yet shared.
        unsafe {
            block.as_ptr().write(Block {
                header: header_value,
                deinit,
                value,
            });
        }
        Ok(Self { header })
    }

    /// Adopts a live reference that was already counted.
    ///
    /// # Safety
    ///
    /// `header` must head a live block and the caller must own one live count.
    pub(crate) unsafe fn from_counted(header: NonNull<Header>) -> Self {
        Self { header }
    }

    #[inline]
    pub(crate) fn header(&self) -> &Header {
        // SAFETY: the block lives while this reference holds a live count.
        unsafe { self.header.as_ref() }
    }

    #[inline]
    pub(crate) fn counter(&self) -> &SharedCounter {
        // SAFETY: the counter outlives every live reference.
        unsafe { self.header().counter.as_ref() }
    }

    /// Pointer to the value.
    ///
    /// # Safety
    ///
    /// The block must have been allocated for a `T`.
    #[inline]
    pub(crate) unsafe fn value_ptr<T>(&self) -> NonNull<T> {
        let block = self.header.cast::<Block<T>>();
        // SAFETY: field projection inside a live allocation.
        unsafe { NonNull::new_unchecked(&raw mut (*block.as_ptr()).value) }
    }

    pub(crate) fn ptr_eq(&self, other: &RawShared) -> bool {
        self.header == other.header
    }

    pub(crate) fn addr(&self) -> usize {
        self.header.as_ptr() as usize
    }
}

impl Clone for RawShared {
    fn clone(&self) -> Self {
        self.counter().increment_live();
        Self {
            header: self.header,
        }
    }
}

impl Drop for RawShared {
    fn drop(&mut self) {
        let counter = self.header().counter;
        // SAFETY: still holding a live count, so the counter is allocated.
        let Some(last) = (unsafe { counter.as_ref() }).decrement_live() else {
            return;
        };
        debug_assert_eq!(last.payload, self.addr());

        let destroy = self.header().destroy;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            type_name = self.header().type_name,
            "destroying shared object"
        );
        // SAFETY: this thread took the live count to zero; nothing else can
        // reach the block any more.
        unsafe { destroy(self.header) };
        if last.state == CounterState::Dead {
            // SAFETY: both counts are zero and the transition happened here.
            unsafe { SharedCounter::free(counter) };
        }
    }
}
