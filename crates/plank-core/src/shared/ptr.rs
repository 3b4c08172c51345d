use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;

use super::any::AnySharedPtr;
use super::counter::Counts;
use super::raw::{DeinitFunction, InitFunction, RawShared};
use super::weak::WeakPtr;
use crate::error::{Error, Result};

/// A thread-safe reference-counted pointer with optional weak references.
///
/// Like [`std::sync::Arc`], helpers are associated functions
/// (`SharedPtr::live_count(&p)`) so they never shadow methods of `T`.
///
/// ```rust
/// use plank_core::SharedPtr;
///
/// let buffer = SharedPtr::new(vec![0.0f32; 64]).unwrap();
/// let reader = buffer.clone();
/// assert_eq!(SharedPtr::live_count(&buffer), 2);
///
/// let weak = SharedPtr::weak_pointer(&buffer).unwrap();
/// drop((buffer, reader));
/// assert!(weak.upgrade().is_none());
/// ```
pub struct SharedPtr<T> {
    raw: RawShared,
    _marker: PhantomData<T>,
}

// SAFETY: same bounds as `Arc<T>`.
unsafe impl<T: Send + Sync> Send for SharedPtr<T> {}
// SAFETY: same bounds as `Arc<T>`.
unsafe impl<T: Send + Sync> Sync for SharedPtr<T> {}

impl<T: 'static> SharedPtr<T> {
    /// Allocates `value` with weak support and no callbacks.
    pub fn new(value: T) -> Result<Self> {
        Ok(Self::builder(value).build()?)
    }

    /// Starts building a pointer with callbacks or without weak support.
    pub fn builder(value: T) -> SharedPtrBuilder<T> {
        SharedPtrBuilder {
            value,
            init: None,
            deinit: None,
            weak: true,
        }
    }
}

impl<T> SharedPtr<T> {
    pub(crate) fn from_raw(raw: RawShared) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub(crate) fn raw(this: &Self) -> &RawShared {
        &this.raw
    }

    /// A new weak reference, or `None` if built [`without_weak`](SharedPtrBuilder::without_weak).
    pub fn weak_pointer(this: &Self) -> Option<WeakPtr<T>> {
        let companion = this.raw.header().weak.as_ref()?;
        this.raw.counter().increment_weak();
        Some(WeakPtr::from_companion(companion.clone()))
    }

    /// Number of live references, including this one.
    pub fn live_count(this: &Self) -> usize {
        Self::counts(this).live
    }

    /// Number of weak references.
    pub fn weak_count(this: &Self) -> usize {
        Self::counts(this).weak
    }

    /// Both counts from one snapshot.
    pub fn counts(this: &Self) -> Counts {
        this.raw.counter().counts()
    }

    /// Whether both pointers manage the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.ptr_eq(&other.raw)
    }

    /// Size of the managed value in bytes.
    pub fn size(this: &Self) -> usize {
        this.raw.header().size
    }

    /// Name of the managed type.
    pub fn type_name(this: &Self) -> &'static str {
        this.raw.header().type_name
    }

    /// Raw pointer to the value; valid while a live reference exists.
    pub fn as_ptr(this: &Self) -> *const T {
        // SAFETY: typed handles only wrap blocks allocated for `T`.
        unsafe { this.raw.value_ptr::<T>() }.as_ptr().cast_const()
    }
}

impl<T: Send + Sync + 'static> SharedPtr<T> {
    /// Erases the value type.
    pub fn into_any(this: Self) -> AnySharedPtr {
        AnySharedPtr::from_raw(this.raw)
    }
}

impl<T> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value lives while this handle holds a live count.
        unsafe { self.raw.value_ptr::<T>().as_ref() }
    }
}

impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: Send + Sync + 'static> From<SharedPtr<T>> for AnySharedPtr {
    fn from(ptr: SharedPtr<T>) -> Self {
        SharedPtr::into_any(ptr)
    }
}

/// Configures a [`SharedPtr`] before allocation.
#[must_use = "call `build` to allocate the pointer"]
pub struct SharedPtrBuilder<T> {
    value: T,
    init: Option<InitFunction<T>>,
    deinit: Option<DeinitFunction<T>>,
    weak: bool,
}

impl<T: 'static> SharedPtrBuilder<T> {
    /// Runs `init` on the value once it is in place, before `build` returns.
    pub fn init(mut self, init: InitFunction<T>) -> Self {
        self.init = Some(init);
        self
    }

    /// Runs `deinit` on the value exactly once, when the last live reference drops.
    pub fn deinit(mut self, deinit: DeinitFunction<T>) -> Self {
        self.deinit = Some(deinit);
        self
    }

    /// Disables weak references; [`SharedPtr::weak_pointer`] returns `None`.
    pub fn without_weak(mut self) -> Self {
        self.weak = false;
        self
    }

    /// Allocates the pointer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`](crate::Error::OutOfMemory) from the allocator,
    /// or the error returned by the init function. A failed init does not
    /// release the pointer: it is handed back through
    /// [`BuildError::into_pointer`] with its live count of one.
    pub fn build(self) -> core::result::Result<SharedPtr<T>, BuildError<T>> {
        let raw = RawShared::allocate(self.value, self.deinit, self.weak)
            .map_err(|error| BuildError { error, ptr: None })?;
        let ptr = SharedPtr::from_raw(raw);
        if let Some(init) = self.init {
            // SAFETY: the pointer has not been shared yet.
            let value = unsafe { SharedPtr::raw(&ptr).value_ptr::<T>().as_mut() };
            if let Err(error) = init(value) {
                return Err(BuildError {
                    error,
                    ptr: Some(ptr),
                });
            }
        }
        Ok(ptr)
    }
}

/// Returned by [`SharedPtrBuilder::build`].
///
/// When the init function failed, the allocated pointer is carried along so
/// the caller decides whether to keep or drop it.
pub struct BuildError<T> {
    error: Error,
    ptr: Option<SharedPtr<T>>,
}

impl<T> BuildError<T> {
    /// The allocation or init error.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// The pointer built before init failed; `None` if allocation failed.
    pub fn into_pointer(self) -> Option<SharedPtr<T>> {
        self.ptr
    }
}

impl<T> fmt::Debug for BuildError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildError")
            .field("error", &self.error)
            .field("allocated", &self.ptr.is_some())
            .finish()
    }
}

impl<T> fmt::Display for BuildError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for BuildError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<BuildError<T>> for Error {
    fn from(err: BuildError<T>) -> Self {
        err.error
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPtrBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtrBuilder")
            .field("value", &self.value)
            .field("init", &self.init.is_some())
            .field("deinit", &self.deinit.is_some())
            .field("weak", &self.weak)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn clone_counts() {
        let a = SharedPtr::new(5u32).unwrap();
        let b = a.clone();
        assert_eq!(*b, 5);
        assert_eq!(SharedPtr::live_count(&a), 2);
        assert!(SharedPtr::ptr_eq(&a, &b));
        drop(b);
        assert_eq!(SharedPtr::live_count(&a), 1);
    }

    #[test]
    fn metadata() {
        let p = SharedPtr::new([0u16; 8]).unwrap();
        assert_eq!(SharedPtr::size(&p), 16);
        assert!(SharedPtr::type_name(&p).contains("u16"));
    }

    static DEINITS: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn deinit_runs_once_on_last_drop() {
        let p = SharedPtr::builder(1u8)
            .deinit(|_| {
                DEINITS.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let clones = [p.clone(), p.clone()];
        assert_eq!(SharedPtr::live_count(&p), 3);
        drop(p);
        drop(clones);
        assert_eq!(DEINITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn init_sees_value_and_can_fail() {
        let p = SharedPtr::builder(vec![1, 2])
            .init(|v| {
                v.push(3);
                Ok(())
            })
            .build()
            .unwrap();
        assert_eq!(*p, vec![1, 2, 3]);

        let err = SharedPtr::builder(0u8)
            .init(|_| Err(Error::NullArgument("init")))
            .build()
            .unwrap_err();
        assert_eq!(err.error(), &Error::NullArgument("init"));
        assert_eq!(Error::from(err), Error::NullArgument("init"));
    }

    static FAILED_INIT_DEINITS: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn failed_init_keeps_pointer_live() {
        let err = SharedPtr::builder(vec![1u8])
            .init(|v| {
                v.push(2);
                Err(Error::NullArgument("init"))
            })
            .deinit(|_| {
                FAILED_INIT_DEINITS.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap_err();

        let ptr = err.into_pointer().unwrap();
        assert_eq!(SharedPtr::live_count(&ptr), 1);
        assert_eq!(*ptr, vec![1, 2]);
        assert!(SharedPtr::weak_pointer(&ptr).is_some());
        assert_eq!(FAILED_INIT_DEINITS.load(Ordering::SeqCst), 0);

        drop(ptr);
        assert_eq!(FAILED_INIT_DEINITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn without_weak_has_no_weak_pointer() {
        let p = SharedPtr::builder(()).without_weak().build().unwrap();
        assert!(SharedPtr::weak_pointer(&p).is_none());
    }

    #[test]
    fn value_is_dropped() {
        let tracker = std::sync::Arc::new(());
        let p = SharedPtr::new(std::sync::Arc::clone(&tracker)).unwrap();
        assert_eq!(std::sync::Arc::strong_count(&tracker), 2);
        drop(p);
        assert_eq!(std::sync::Arc::strong_count(&tracker), 1);
    }
}
