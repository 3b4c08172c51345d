//! Reference-counted shared pointers with weak references.
//!
//! # Layout
//!
//! Each shared object is two allocations from the process-wide allocator:
//!
//! - a **block** holding a header (size, type, counter pointer, companion),
//!   the optional deinit function and the value itself;
//! - a **counter**, one tagged word whose payload is the block address and
//!   whose tag packs `live << (BITS / 2) | weak`.
//!
//! The value is destroyed exactly once, by the thread whose decrement takes
//! the live count to zero; that same compare-and-swap clears the payload, so
//! [`WeakPtr::upgrade`] can never revive it. The counter is freed by whichever
//! thread takes both counts to zero ([`CounterState::Dead`]).
//!
//! Weak references go through a companion object: a shared pointer (without
//! weak support of its own) that the block and every [`WeakPtr`] hold a live
//! reference to, and that carries the counter address.
//!
//! | Operation | Live | Weak |
//! |-----------|------|------|
//! | [`SharedPtr::clone`](Clone::clone), [`WeakPtr::upgrade`] | +1 | |
//! | drop [`SharedPtr`] | -1 | |
//! | [`SharedPtr::weak_pointer`], [`WeakPtr::clone`](Clone::clone) | | +1 |
//! | drop [`WeakPtr`] | | -1 |

mod any;
mod array;
mod counter;
mod ptr;
mod raw;
mod weak;

pub use any::AnySharedPtr;
pub use array::SharedPtrArray;
pub use counter::{CounterState, Counts, MAX_COUNT};
pub use ptr::{BuildError, SharedPtr, SharedPtrBuilder};
pub use raw::{DeinitFunction, InitFunction};
pub use weak::WeakPtr;
