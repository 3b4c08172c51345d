//! Error types for the core containers and pointers.

use core::fmt;

/// Errors reported by the core primitives.
///
/// Contention is never surfaced through this type: lock-free operations retry
/// until they commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The allocator could not satisfy a request.
    #[error("out of memory allocating {size} bytes")]
    OutOfMemory {
        /// Size of the failed request in bytes.
        size: usize,
    },

    /// A null pointer was passed where a valid one is required.
    #[error("null argument: {0}")]
    NullArgument(&'static str),

    /// An array index was out of range.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the array at the time of the call.
        len: usize,
    },

    /// A shared pointer of the wrong managed type was supplied.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the type the slot accepts.
        expected: &'static str,
        /// Name of the type that was supplied.
        found: &'static str,
    },

    /// A queue or stack was torn down while still holding elements.
    #[error("container not empty on teardown ({len} elements remaining)")]
    ContainerNotEmptyOnTeardown {
        /// Number of elements still held.
        len: usize,
    },

    /// A required callback was not supplied.
    #[error("required function not supplied: {0}")]
    FunctionsInvalid(&'static str),

    /// Process-wide configuration was attempted after it had been fixed.
    #[error("process-wide settings are already in effect")]
    AlreadyConfigured,

    /// The native double-width compare-and-swap was requested but the target
    /// does not provide one.
    #[error("native double-width compare-and-swap is unavailable on this target")]
    NativeCasUnavailable,

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
}

/// Convenience result type for core operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Returned when a container is de-initialized while it still holds elements.
///
/// The container is handed back untouched so the caller can drain it and try
/// again.
pub struct TeardownError<C> {
    container: C,
    len: usize,
}

impl<C> TeardownError<C> {
    pub(crate) fn new(container: C, len: usize) -> Self {
        Self { container, len }
    }

    /// Number of elements the container held when teardown was refused.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a teardown error is only produced for non-empty containers.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Recovers the container.
    pub fn into_inner(self) -> C {
        self.container
    }
}

impl<C> fmt::Debug for TeardownError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeardownError")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<C> fmt::Display for TeardownError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container not empty on teardown ({} elements remaining)",
            self.len
        )
    }
}

impl<C> std::error::Error for TeardownError<C> {}

impl<C> From<TeardownError<C>> for Error {
    fn from(err: TeardownError<C>) -> Self {
        Error::ContainerNotEmptyOnTeardown { len: err.len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_display() {
        let err = Error::OutOfMemory { size: 32 };
        assert_eq!(err.to_string(), "out of memory allocating 32 bytes");
    }

    #[test]
    fn index_out_of_range_display() {
        let err = Error::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range for length 2");
    }

    #[test]
    fn type_mismatch_display() {
        let err = Error::TypeMismatch {
            expected: "u32",
            found: "f32",
        };
        assert_eq!(err.to_string(), "type mismatch: expected u32, found f32");
    }

    #[test]
    fn teardown_error_returns_container() {
        let err = TeardownError::new(vec![1, 2, 3], 3);
        assert_eq!(err.len(), 3);
        assert!(err.to_string().contains("3 elements remaining"));
        assert_eq!(err.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn teardown_error_converts_to_error_kind() {
        let err: Error = TeardownError::new((), 5).into();
        assert_eq!(err, Error::ContainerNotEmptyOnTeardown { len: 5 });
    }
}
