//! Error types for the allocator core.
//!
//! These are the only two failure modes the public API can report to a
//! caller; everything else (invariant corruption) is diagnosed by
//! [`crate::check`] and never turned into a `Result`.

use core::fmt;

/// Failures the allocator can report through its public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The arena provider could not grow the arena to satisfy a request.
    OutOfMemory,
    /// The arena provider could not supply the initial prologue/epilogue
    /// padding during `init`.
    InitFailed,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "arena provider failed to grow the arena"),
            Self::InitFailed => write!(f, "arena provider failed to supply initial padding"),
        }
    }
}

/// Convenience result type for allocator-core operations.
pub type AllocResult<T = ()> = Result<T, AllocError>;
