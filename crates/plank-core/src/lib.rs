//! Plank Core - lock-free containers and shared pointers
//!
//! The concurrency layer of the plank audio engine: everything here is safe
//! to call from any number of threads at once, and the container operations
//! never block.
//!
//! # Core Abstractions
//!
//! ## Atomics
//!
//! - [`TaggedWord`] - A `(payload, tag)` pair read and compare-and-swapped as one unit
//! - [`CasBackend`] - Which double-width CAS implementation is in use
//!
//! ## Containers
//!
//! - [`LockFreeQueue`] - Multi-producer, multi-consumer FIFO of [`OwnedElement`]s
//! - [`LockFreeStack`] - Multi-producer, multi-consumer LIFO of [`OwnedElement`]s
//! - [`BoxedQueue`] / [`BoxedStack`] - Typed wrappers moving `T` values between threads
//!
//! ## Shared Pointers
//!
//! - [`SharedPtr`] - Reference-counted pointer with deinit callbacks
//! - [`WeakPtr`] - Non-owning reference that never revives a destroyed value
//! - [`AnySharedPtr`] - Type-erased shared pointer
//! - [`SharedPtrArray`] - Ordered array of shared pointers
//!
//! ## Process-wide Configuration
//!
//! - [`configure`] / [`Settings`] - CAS backend, lock striping and contention policy
//! - [`memory::set_global_allocator`] - Allocator for elements, blocks and counters
//! - [`Lock`] - Mutex + condition pair used by the emulated backend
//!
//! Both must be set before the first container or pointer is used; afterwards
//! they report [`Error::AlreadyConfigured`].
//!
//! # Example
//!
//! ```rust
//! use plank_core::{LockFreeQueue, OwnedElement};
//!
//! let queue = LockFreeQueue::new();
//! for data in [1, 2, 3] {
//!     queue.push(OwnedElement::with_data(data).unwrap());
//! }
//! let order: Vec<usize> = std::iter::from_fn(|| queue.pop().map(OwnedElement::into_data)).collect();
//! assert_eq!(order, [1, 2, 3]);
//! assert!(queue.pop().is_none());
//! ```
//!
//! # Logging
//!
//! Enable the `tracing` feature to emit `tracing` events for backend
//! selection, settings, containers dropped while non-empty and shared object
//! destruction.

pub mod atomic;
pub mod boxed;
pub mod element;
pub mod error;
pub mod lock;
pub mod memory;
pub mod queue;
pub mod settings;
pub mod shared;
pub mod stack;

// Re-export main types at crate root
pub use atomic::{CasBackend, TaggedValue, TaggedWord};
pub use boxed::{BoxedQueue, BoxedStack};
pub use element::{FreeDataFunction, ListElement, OwnedElement};
pub use error::{Error, Result, TeardownError};
pub use lock::{Lock, LockGuard};
pub use memory::{Allocator, FunctionAllocator, SystemAllocator};
pub use queue::LockFreeQueue;
pub use settings::{CasBackendPreference, ContentionStrategy, Settings, configure};
pub use shared::{
    AnySharedPtr, BuildError, CounterState, Counts, DeinitFunction, InitFunction, SharedPtr,
    SharedPtrArray, SharedPtrBuilder, WeakPtr,
};
pub use stack::LockFreeStack;
