#![cfg_attr(not(feature = "std"), no_std)]
#![allow(unsafe_op_in_unsafe_fn)]

//! A general-purpose dynamic memory allocator over a host-supplied byte
//! arena: first-fit placement with split, explicit doubly-linked free
//! list, boundary-tag coalescing, 16-byte payload alignment.
//!
//! The allocator is single-threaded and cooperative (see `DESIGN.md` —
//! concurrency is explicitly out of scope); all module-scoped state
//! lives in one global [`State`], guarded only by the caller's
//! obligation not to call the public API from more than one thread at a
//! time.
//!
//! # Block layout
//!
//! ```text
//! [ header: 8B size|flag ] [ payload: >= 16B ] [ footer: 8B size|flag ]
//! ```
//!
//! Free blocks thread the explicit free list through their first 16
//! payload bytes (`next` then `prev`); allocated blocks never touch
//! those bytes.

pub mod arena;
pub mod block;
pub mod check;
pub mod coalesce;
pub mod error;
pub mod free_list;
pub mod placement;

use core::cell::UnsafeCell;
use core::ffi::c_void;
use core::ptr;

pub use arena::ArenaProvider;
pub use check::AuditReport;
pub use error::{AllocError, AllocResult};

use block::WORD;
use free_list::FreeList;

/// The three pieces of module-scoped state the design calls out, plus
/// the registered arena provider. `heap_first`/`heap_last` are null
/// until the first successful `init`.
struct State {
    heap_first: *mut u8,
    heap_last: *mut u8,
    free_list: FreeList,
    provider: Option<&'static dyn ArenaProvider>,
    initialized: bool,
}

impl State {
    const fn new() -> Self {
        Self {
            heap_first: ptr::null_mut(),
            heap_last: ptr::null_mut(),
            free_list: FreeList::new(),
            provider: None,
            initialized: false,
        }
    }
}

/// `State` is only ever touched from one logical thread at a time (the
/// crate's non-goal list rules out concurrent use); this wrapper exists
/// purely so the `static` below type-checks.
struct GlobalState(UnsafeCell<State>);
unsafe impl Sync for GlobalState {}

static GLOBAL: GlobalState = GlobalState(UnsafeCell::new(State::new()));

/// # Safety
/// The caller must not hold another live reference obtained through
/// this function at the same time, and must not call the public API
/// from more than one thread concurrently.
#[inline]
unsafe fn state_mut() -> &'static mut State {
    unsafe { &mut *GLOBAL.0.get() }
}

/// Register the arena provider the allocator should grow against. Must
/// be called before the first `init` (or first `malloc`/`calloc`, which
/// lazily call `init`).
pub fn set_arena_provider(provider: &'static dyn ArenaProvider) {
    unsafe { state_mut() }.provider = Some(provider);
}

fn is_initialized() -> bool {
    unsafe { state_mut() }.initialized
}

/// `init()`: (re-)derive sentinels from the registered arena provider
/// and reset the free list. Returns `0` on success, `-1` on failure.
///
/// Re-invocation is supported: it logically releases every prior
/// allocation (their pointers must not be retained across `init`) and
/// re-derives `heap_first`/`heap_last` from the provider's current
/// bounds, so repeated test traces can each start from a clean heap.
pub fn init() -> i32 {
    let state = unsafe { state_mut() };
    let Some(provider) = state.provider else {
        return -1;
    };

    match arena::init(provider) {
        Ok(sentinels) => {
            state.heap_first = sentinels.heap_first;
            state.heap_last = sentinels.heap_last;
            state.free_list = FreeList::new();
            state.initialized = true;
            0
        }
        Err(_) => {
            state.initialized = false;
            -1
        }
    }
}

/// `malloc(size)`.
pub fn malloc(size: usize) -> *mut c_void {
    if !is_initialized() && init() != 0 {
        return ptr::null_mut();
    }
    if size == 0 {
        return ptr::null_mut();
    }

    let state = unsafe { state_mut() };
    let adj = placement::adjust_size(size);

    let mut b = unsafe { placement::find_fit(&mut state.free_list, adj) };
    if b.is_null() {
        let Some(provider) = state.provider else {
            return ptr::null_mut();
        };
        b = match unsafe { arena::create_space(provider, state.heap_last, adj) } {
            Ok(block) => {
                state.heap_last = unsafe { state.heap_last.add(adj) };
                block
            }
            Err(_) => return ptr::null_mut(),
        };
    }

    unsafe { block::payload_of(b) as *mut c_void }
}

/// `free(ptr)`.
pub fn free(payload: *mut c_void) {
    if payload.is_null() {
        return;
    }
    if !is_initialized() {
        init();
    }

    let state = unsafe { state_mut() };
    let b = unsafe { block::header_of_payload(payload as *mut u8) };
    let size = unsafe { block::size_of_block(b) };

    unsafe {
        block::set_block(b, size, false);
        state.free_list.append(b);
        coalesce::coalesce(&mut state.free_list, state.heap_first, state.heap_last, b);
    }
}

/// `realloc(ptr, size)`.
pub fn realloc(payload: *mut c_void, size: usize) -> *mut c_void {
    if size == 0 {
        free(payload);
        return ptr::null_mut();
    }
    if payload.is_null() {
        return malloc(size);
    }

    let old_b = unsafe { block::header_of_payload(payload as *mut u8) };
    let old_payload_size = unsafe { block::size_of_block(old_b) } - 2 * WORD;

    let new_payload = malloc(size);
    if new_payload.is_null() {
        return ptr::null_mut();
    }

    let copy_len = core::cmp::min(size, old_payload_size);
    unsafe {
        ptr::copy_nonoverlapping(payload as *const u8, new_payload as *mut u8, copy_len);
    }
    free(payload);

    new_payload
}

/// `calloc(nmemb, size)`.
///
/// The design notes leave multiplication-overflow handling at the
/// implementer's discretion; this implementation checks for it and
/// returns null rather than silently wrapping.
pub fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    let Some(total) = nmemb.checked_mul(size) else {
        return ptr::null_mut();
    };

    let payload = malloc(total);
    if !payload.is_null() {
        unsafe { ptr::write_bytes(payload as *mut u8, 0, total) };
    }
    payload
}

/// `check(verbose)`: run the self-check and report to the diagnostic
/// sink. Violations are never acted on or surfaced as errors.
pub fn check(verbose: i32) {
    check_at(0, verbose != 0);
}

/// Same as [`check`] but returns the tally instead of discarding it, and
/// accepts a call-site line for diagnostic messages. Exposed mainly for
/// tests that want to assert on invariant violations directly.
pub fn check_at(line: i32, verbose: bool) -> AuditReport {
    let state = unsafe { state_mut() };
    unsafe { check::audit(&state.free_list, state.heap_first, state.heap_last, line, verbose) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fixed-size bump-pointer arena backing tests. Mirrors a `brk`-style
    /// host: `arena_extend` only ever moves the logical high-water mark
    /// forward inside a pre-reserved buffer, so outstanding block
    /// pointers are never invalidated by growth.
    pub struct TestArena {
        buf: *mut u8,
        capacity: usize,
        used: AtomicUsize,
    }

    unsafe impl Sync for TestArena {}

    impl TestArena {
        fn new(capacity: usize) -> &'static TestArena {
            let layout = std::alloc::Layout::from_size_align(capacity, 16).unwrap();
            let buf = unsafe { std::alloc::alloc_zeroed(layout) };
            assert!(!buf.is_null());
            Box::leak(Box::new(TestArena {
                buf,
                capacity,
                used: AtomicUsize::new(0),
            }))
        }
    }

    impl TestArena {
        /// Reset the bump pointer, simulating a host that tears down
        /// and remaps the arena between scripted test traces.
        fn reset(&self) {
            self.used.store(0, Ordering::Relaxed);
        }
    }

    impl ArenaProvider for TestArena {
        fn arena_extend(&self, n: usize) -> Option<*mut u8> {
            let prev = self.used.load(Ordering::Relaxed);
            if prev + n > self.capacity {
                return None;
            }
            self.used.store(prev + n, Ordering::Relaxed);
            Some(unsafe { self.buf.add(prev) })
        }

        fn arena_lo(&self) -> *mut u8 {
            self.buf
        }

        fn arena_hi(&self) -> *mut u8 {
            let used = self.used.load(Ordering::Relaxed);
            unsafe { self.buf.add(used.max(1) - 1) }
        }
    }

    /// `State` is a single global, so tests that touch it must not run
    /// concurrently with each other.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn fresh_heap(capacity: usize) -> std::sync::MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_arena_provider(TestArena::new(capacity));
        assert_eq!(init(), 0);
        guard
    }

    #[test]
    fn malloc_zero_returns_null() {
        let _g = fresh_heap(1 << 16);
        assert!(malloc(0).is_null());
    }

    #[test]
    fn free_null_is_noop() {
        let _g = fresh_heap(1 << 16);
        free(ptr::null_mut());
    }

    #[test]
    fn realloc_null_is_malloc() {
        let _g = fresh_heap(1 << 16);
        let p = realloc(ptr::null_mut(), 32);
        assert!(!p.is_null());
        assert_eq!(p as usize % 16, 0);
    }

    #[test]
    fn realloc_zero_frees_and_returns_null() {
        let _g = fresh_heap(1 << 16);
        let p = malloc(32);
        assert!(realloc(p, 0).is_null());
        let report = check_at(0, false);
        assert!(report.is_clean());
    }

    #[test]
    fn payload_pointers_are_16_byte_aligned() {
        let _g = fresh_heap(1 << 16);
        for n in [1usize, 15, 16, 17, 100, 4096] {
            let p = malloc(n);
            assert!(!p.is_null());
            assert_eq!(p as usize % 16, 0, "size {n} misaligned");
        }
    }

    #[test]
    fn no_cross_allocation_aliasing() {
        let _g = fresh_heap(1 << 16);
        let a = malloc(64) as *mut u8;
        let b = malloc(64) as *mut u8;
        unsafe {
            ptr::write_bytes(a, 0xAA, 64);
            ptr::write_bytes(b, 0xBB, 64);
            for i in 0..64 {
                assert_eq!(*a.add(i), 0xAA);
                assert_eq!(*b.add(i), 0xBB);
            }
        }
    }

    // S1 — split and coalesce.
    #[test]
    fn scenario_split_and_coalesce() {
        let _g = fresh_heap(1 << 16);
        let p = malloc(48);
        let q = malloc(48);
        assert!(!p.is_null() && !q.is_null());
        free(p);
        free(q);

        let state = unsafe { state_mut() };
        assert_eq!(unsafe { state.free_list.len() }, 1);
        let merged_size = unsafe { block::size_of_block(state.free_list.head()) };
        assert!(merged_size >= 2 * (2 * WORD + 48));
    }

    // S2 — no-split fit: reusing an existing free block shrinks the list.
    #[test]
    fn scenario_reuse_without_growth() {
        let _g = fresh_heap(1 << 16);
        let a = malloc(16);
        let b = malloc(32);
        free(a);
        free(b);

        let before = unsafe { state_mut().free_list.len() };
        let c = malloc(16);
        assert!(!c.is_null());
        let after = unsafe { state_mut().free_list.len() };
        assert!(after <= before);
    }

    // S3 — LIFO free list / full coalescing of adjacent allocations.
    #[test]
    fn scenario_adjacent_frees_coalesce_fully() {
        let _g = fresh_heap(1 << 16);
        let p = malloc(16);
        let q = malloc(16);
        let r = malloc(16);
        free(p);
        free(q);
        free(r);

        let state = unsafe { state_mut() };
        assert_eq!(unsafe { state.free_list.len() }, 1);
    }

    // S4 — realloc grows, preserving the prefix.
    #[test]
    fn scenario_realloc_grows_preserves_prefix() {
        let _g = fresh_heap(1 << 16);
        let p = malloc(16) as *mut u8;
        unsafe { ptr::write_bytes(p, 0xAA, 16) };
        let q = realloc(p as *mut c_void, 64) as *mut u8;
        assert!(!q.is_null());
        for i in 0..16 {
            assert_eq!(unsafe { *q.add(i) }, 0xAA);
        }
    }

    // S5 — calloc zeros and aligns.
    #[test]
    fn scenario_calloc_zeros() {
        let _g = fresh_heap(1 << 16);
        let p = calloc(10, 8) as *mut u8;
        assert!(!p.is_null());
        assert_eq!(p as usize % 16, 0);
        for i in 0..80 {
            assert_eq!(unsafe { *p.add(i) }, 0);
        }
    }

    #[test]
    fn calloc_overflow_returns_null() {
        let _g = fresh_heap(1 << 16);
        assert!(calloc(usize::MAX, 2).is_null());
    }

    // S6 — fragmentation resistance under an alternating alloc/free pattern.
    #[test]
    fn scenario_fragmentation_resistance() {
        let _g = fresh_heap(4 << 20);
        let mut blocks = std::vec::Vec::with_capacity(1000);
        for _ in 0..1000 {
            let p = malloc(32);
            assert!(!p.is_null());
            blocks.push(p);
        }
        for (i, p) in blocks.iter().enumerate() {
            if i % 2 == 0 {
                free(*p);
            }
        }

        let used_before = unsafe { state_mut().heap_last as usize };
        let extra = malloc(32);
        assert!(!extra.is_null());
        let used_after = unsafe { state_mut().heap_last as usize };
        assert_eq!(used_before, used_after, "reused a free block instead of growing");
    }

    #[test]
    fn check_reports_clean_state_after_free_malloc_roundtrip() {
        let _g = fresh_heap(1 << 16);
        let p = malloc(64);
        free(p);
        let report = check_at(0, false);
        assert!(report.is_clean());
    }

    #[test]
    fn reinit_resets_free_list() {
        let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let arena = TestArena::new(1 << 16);
        set_arena_provider(arena);
        assert_eq!(init(), 0);

        let p = malloc(64);
        free(p);
        assert_eq!(unsafe { state_mut().free_list.len() }, 1);

        // A host re-running a fresh trace resets its own arena before
        // asking the allocator to re-initialize against it.
        arena.reset();
        assert_eq!(init(), 0);
        assert_eq!(unsafe { state_mut().free_list.len() }, 0);
        drop(guard);
    }

    #[test]
    fn free_list_remove_from_middle_keeps_ends_linked() {
        let _g = fresh_heap(1 << 16);
        // Three same-sized, non-adjacent allocations (separated by a
        // live neighbor each) so freeing them lands three independent
        // blocks in the free list without coalescing.
        let a = malloc(16);
        let _spacer1 = malloc(16);
        let b = malloc(16);
        let _spacer2 = malloc(16);
        let c = malloc(16);

        free(a);
        free(b);
        free(c);

        let state = unsafe { state_mut() };
        assert_eq!(unsafe { state.free_list.len() }, 3);

        // Remove the middle node (`b`, freed second, so it sits between
        // `c` and `a` in the LIFO list) and verify the ends still link.
        let b_block = unsafe { block::header_of_payload(b as *mut u8) };
        unsafe { state.free_list.remove(b_block) };
        assert_eq!(unsafe { state.free_list.len() }, 2);

        let head = state.free_list.head();
        assert!(!head.is_null());
        let tail = unsafe { state.free_list.tail() };
        assert!(!tail.is_null());
    }
}
