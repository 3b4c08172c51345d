//! Process-wide raw allocator used for list elements, shared blocks and counters.
//!
//! The allocator is pluggable: install one with [`set_global_allocator`] before
//! any container or shared pointer is created. Once the first allocation has
//! gone through [`global`], the choice is fixed for the life of the process.
//!
//! ```rust
//! use plank_core::memory::{self, Allocator};
//! use core::alloc::Layout;
//!
//! let layout = Layout::new::<u64>();
//! let ptr = memory::global().allocate(layout).expect("allocation");
//! // SAFETY: `ptr` came from the same allocator with the same layout.
//! unsafe { memory::global().free(ptr, layout) };
//! ```

use core::alloc::Layout;
use core::ptr::NonNull;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// A raw allocator for fixed-layout blocks.
///
/// Implementations must be usable from any thread at any time.
pub trait Allocator: Send + Sync {
    /// Allocates a block for `layout`, returning `None` when exhausted.
    ///
    /// `layout` never has zero size.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// - `ptr` must have been returned by [`Allocator::allocate`] on this
    ///   allocator with the same `layout`.
    /// - `ptr` must not be used after this call.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The default allocator, backed by the Rust global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() != 0);
        // SAFETY: callers never request zero-sized layouts.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Allocation callback for [`FunctionAllocator`].
pub type AllocateFunction<C> = fn(&C, Layout) -> Option<NonNull<u8>>;

/// Free callback for [`FunctionAllocator`].
///
/// Receives exactly the pointers and layouts the matching
/// [`AllocateFunction`] produced.
pub type FreeFunction<C> = unsafe fn(&C, NonNull<u8>, Layout);

/// An allocator assembled from an allocate/free function pair and an opaque
/// context shared by both.
pub struct FunctionAllocator<C> {
    context: C,
    allocate: AllocateFunction<C>,
    free: FreeFunction<C>,
}

impl<C: Send + Sync> FunctionAllocator<C> {
    /// Builds an allocator from a function pair.
    ///
    /// Both functions are required; a missing one is reported as
    /// [`Error::FunctionsInvalid`].
    pub fn new(
        context: C,
        allocate: Option<AllocateFunction<C>>,
        free: Option<FreeFunction<C>>,
    ) -> Result<Self> {
        let allocate = allocate.ok_or(Error::FunctionsInvalid("allocate"))?;
        let free = free.ok_or(Error::FunctionsInvalid("free"))?;
        Ok(Self {
            context,
            allocate,
            free,
        })
    }

    /// The context passed to both functions.
    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C: Send + Sync> Allocator for FunctionAllocator<C> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (self.allocate)(&self.context, layout)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller's contract.
        unsafe { (self.free)(&self.context, ptr, layout) }
    }
}

static SYSTEM: SystemAllocator = SystemAllocator;
static GLOBAL: OnceLock<&'static dyn Allocator> = OnceLock::new();

/// Installs the process-wide allocator.
///
/// Must be called before the first allocation; afterwards the allocator in use
/// is fixed and this returns [`Error::AlreadyConfigured`].
pub fn set_global_allocator(allocator: &'static dyn Allocator) -> Result<()> {
    GLOBAL
        .set(allocator)
        .map_err(|_| Error::AlreadyConfigured)
}

/// The process-wide allocator, defaulting to [`SystemAllocator`].
pub fn global() -> &'static dyn Allocator {
    *GLOBAL.get_or_init(|| &SYSTEM)
}

/// Allocates uninitialized storage for one `T` from the global allocator.
pub(crate) fn allocate<T>() -> Result<NonNull<T>> {
    let layout = Layout::new::<T>();
    global()
        .allocate(layout)
        .map(NonNull::cast)
        .ok_or(Error::OutOfMemory {
            size: layout.size(),
        })
}

/// Returns storage for one `T` to the global allocator without dropping it.
///
/// # Safety
///
/// `ptr` must come from [`allocate::<T>`] and must not be used afterwards.
pub(crate) unsafe fn free<T>(ptr: NonNull<T>) {
    // SAFETY: forwarded from the caller's contract.
    unsafe { global().free(ptr.cast(), Layout::new::<T>()) }
}
