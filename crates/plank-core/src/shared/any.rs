use core::any::TypeId;
use core::fmt;

use super::ptr::SharedPtr;
use super::raw::RawShared;
use crate::error::{Error, Result};

/// A [`SharedPtr`] whose value type is only known at runtime.
///
/// Clones and drops count exactly like the typed pointer it came from.
#[derive(Clone)]
pub struct AnySharedPtr {
    raw: RawShared,
}

// SAFETY: only built from `SharedPtr<T>` with `T: Send + Sync`.
unsafe impl Send for AnySharedPtr {}
// SAFETY: see above.
unsafe impl Sync for AnySharedPtr {}

impl AnySharedPtr {
    pub(crate) fn from_raw(raw: RawShared) -> Self {
        Self { raw }
    }

    /// `TypeId` of the managed value.
    pub fn managed_type(&self) -> TypeId {
        self.raw.header().type_id
    }

    /// Name of the managed type.
    pub fn type_name(&self) -> &'static str {
        self.raw.header().type_name
    }

    /// Size of the managed value in bytes.
    pub fn size(&self) -> usize {
        self.raw.header().size
    }

    /// Number of live references.
    pub fn live_count(&self) -> usize {
        self.raw.counter().counts().live
    }

    /// Whether the value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.managed_type() == TypeId::of::<T>()
    }

    /// Whether both pointers manage the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.ptr_eq(&other.raw)
    }

    /// Recovers the typed pointer, or gives `self` back on a mismatch.
    pub fn downcast<T: Send + Sync + 'static>(self) -> core::result::Result<SharedPtr<T>, Self> {
        if self.is::<T>() {
            Ok(SharedPtr::from_raw(self.raw))
        } else {
            Err(self)
        }
    }

    /// Borrows the value as a `T`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not a `T`.
    pub fn try_as<T: 'static>(&self) -> Result<&T> {
        if !self.is::<T>() {
            return Err(Error::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: self.type_name(),
            });
        }
        // SAFETY: the type id matches the block's value type.
        Ok(unsafe { self.raw.value_ptr::<T>().as_ref() })
    }
}

impl fmt::Debug for AnySharedPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySharedPtr")
            .field("type_name", &self.type_name())
            .field("live", &self.live_count())
            .finish()
    }
}
