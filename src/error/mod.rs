//! Error types for blockheap.

use std::fmt;

/// Boxed cause attached to an error.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Default code for [`HeapError::Overflow`].
pub const OVERFLOW_CODE: u32 = 123125;

/// Default code for [`HeapError::BoundsExceeded`].
pub const BOUNDS_EXCEEDED_CODE: u32 = 123123;

/// Code for [`HeapError::BoundsExceeded`] raised through a handle that was
/// invalidated by [`Allocator::clear`](crate::Allocator::clear).
pub const STALE_HANDLE_CODE: u32 = 123124;

/// Errors that can occur while storing, reading or writing payloads.
#[derive(Debug)]
pub enum HeapError {
    /// The buffer has no free block able to hold the request, or a write
    /// would run past the block it was sliced into.
    Overflow {
        /// Numeric error code.
        code: u32,
        /// Human readable description.
        message: &'static str,
        /// Underlying cause, if any.
        cause: Option<Cause>,
    },

    /// An offset/length pair fell outside the extent of a handle.
    BoundsExceeded {
        /// Numeric error code.
        code: u32,
        /// Human readable description.
        message: &'static str,
        /// Underlying cause, if any.
        cause: Option<Cause>,
    },

    /// Invalid configuration parameter.
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },
}

impl HeapError {
    /// Builds an [`HeapError::Overflow`] with the default code and no cause.
    pub fn overflow(message: &'static str) -> Self {
        HeapError::Overflow {
            code: OVERFLOW_CODE,
            message,
            cause: None,
        }
    }

    /// Builds an [`HeapError::BoundsExceeded`] with the default code and no cause.
    pub fn bounds_exceeded(message: &'static str) -> Self {
        HeapError::BoundsExceeded {
            code: BOUNDS_EXCEEDED_CODE,
            message,
            cause: None,
        }
    }

    pub(crate) fn stale_handle() -> Self {
        HeapError::BoundsExceeded {
            code: STALE_HANDLE_CODE,
            message: "handle was invalidated by clear",
            cause: None,
        }
    }

    /// Attaches a cause to an `Overflow` or `BoundsExceeded` error.
    ///
    /// `InvalidConfig` carries no cause and is returned unchanged.
    pub fn with_cause(mut self, err: impl Into<Cause>) -> Self {
        match &mut self {
            HeapError::Overflow { cause, .. } | HeapError::BoundsExceeded { cause, .. } => {
                *cause = Some(err.into());
            }
            HeapError::InvalidConfig { .. } => {}
        }
        self
    }

    /// Returns the numeric code, or `None` for configuration errors.
    pub fn code(&self) -> Option<u32> {
        match self {
            HeapError::Overflow { code, .. } | HeapError::BoundsExceeded { code, .. } => {
                Some(*code)
            }
            HeapError::InvalidConfig { .. } => None,
        }
    }

    /// Returns true for [`HeapError::Overflow`].
    pub fn is_overflow(&self) -> bool {
        matches!(self, HeapError::Overflow { .. })
    }

    /// Returns true for [`HeapError::BoundsExceeded`].
    pub fn is_bounds_exceeded(&self) -> bool {
        matches!(self, HeapError::BoundsExceeded { .. })
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Overflow { code, message, .. } => {
                write!(f, "buffer overflow ({}): {}", code, message)
            }
            HeapError::BoundsExceeded { code, message, .. } => {
                write!(f, "bounds exceeded ({}): {}", code, message)
            }
            HeapError::InvalidConfig { message } => {
                write!(f, "invalid config: {}", message)
            }
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Overflow { cause, .. } | HeapError::BoundsExceeded { cause, .. } => cause
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            HeapError::InvalidConfig { .. } => None,
        }
    }
}
