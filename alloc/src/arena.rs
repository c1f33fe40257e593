//! Arena lifecycle: the host collaborator, sentinel placement, and growth.
//!
//! The allocator never maps or owns memory itself. It asks a host-supplied
//! [`ArenaProvider`] to grow a contiguous region and report its bounds;
//! everything above that — block layout, free list, coalescing — is this
//! crate's problem, not the host's.

use crate::block::{WORD, set_block};
use crate::error::{AllocError, AllocResult};

/// Host-supplied arena primitives. Implemented once by whatever owns the
/// backing memory (a `brk`-style bump region, an `mmap`ed test fixture,
/// a scripted trace-file harness); consumed by this crate exactly three
/// ways, matching the external interface in the allocator's design notes.
pub trait ArenaProvider: Sync {
    /// Enlarge the arena by exactly `n` bytes. Returns the previous
    /// top-of-arena address (the start of the newly added region), or
    /// `None` if the arena could not grow.
    fn arena_extend(&self, n: usize) -> Option<*mut u8>;

    /// Inclusive low bound of the currently-mapped region.
    fn arena_lo(&self) -> *mut u8;

    /// Inclusive high bound of the currently-mapped region.
    fn arena_hi(&self) -> *mut u8;
}

/// The prologue/epilogue padding requested from the provider on `init`:
/// two boundary-tag words plus one word of alignment slack.
pub const INIT_PADDING: usize = 2 * ALIGN_WORD + WORD;
const ALIGN_WORD: usize = 16;

/// Sentinel bookkeeping derived from the arena provider at `init` time.
pub struct Sentinels {
    /// Left stop for coalescence; the implicit block sequence begins at
    /// `heap_first + 2 * WORD` (the 16 bytes in between are prologue
    /// padding, not a block).
    pub heap_first: *mut u8,
    /// Address just past the last real block — not a block itself, reads
    /// of it are undefined. Repositioned on every `create_space`.
    pub heap_last: *mut u8,
}

/// `init()`: request the initial padding and derive both sentinels.
///
/// Re-invocation is supported and simply re-derives the sentinels from
/// the provider's current bounds — callers must not retain pointers
/// across a second `init`.
pub fn init(provider: &dyn ArenaProvider) -> AllocResult<Sentinels> {
    if provider.arena_extend(INIT_PADDING).is_none() {
        return Err(AllocError::InitFailed);
    }

    Ok(Sentinels {
        heap_first: unsafe { provider.arena_lo().add(WORD) },
        heap_last: unsafe { provider.arena_hi().sub(ALIGN_WORD - 1) },
    })
}

/// `create_space(n)`: grow the arena by `n` bytes and carve a single
/// allocated block at the previous `heap_last`.
///
/// Returns the new block's header pointer; the caller is responsible for
/// advancing its own `heap_last` by `n`.
///
/// The block is placed at the allocator's own tracked `heap_last`, not
/// at whatever address the provider's return value happens to report —
/// that return value only tells us growth succeeded. The provider is
/// trusted to keep enough room mapped ahead of `heap_last` that writing
/// `n` bytes there is valid once `arena_extend(n)` has returned success.
///
/// # Safety
/// `heap_last` must be the allocator's current placement address, and
/// the provider must guarantee that address is writable for `n` bytes
/// once `arena_extend` succeeds.
pub unsafe fn create_space(
    provider: &dyn ArenaProvider,
    heap_last: *mut u8,
    n: usize,
) -> AllocResult<*mut u8> {
    provider.arena_extend(n).ok_or(AllocError::OutOfMemory)?;

    unsafe { set_block(heap_last, n, true) };
    Ok(heap_last)
}
