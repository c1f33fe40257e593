//! Diagnostic sink.
//!
//! All diagnostic output funnels through a single **backend** function
//! pointer, exactly as the kernel's logging subsystem does for serial
//! output. During ordinary use the default backend writes to `stderr`;
//! a host embedding this crate (a fuzzer, a trace-file driver, an
//! in-memory test harness) can install its own backend to capture or
//! silence output instead.
//!
//! # Backend contract
//!
//! The backend receives the pre-formatted arguments for a **single**
//! diagnostic line and is responsible for writing it out; no trailing
//! newline is appended by the dispatcher (callers decide whether their
//! message wants one).
//!
//! # Registration
//!
//! ```ignore
//! tagalloc_lib::diag::diag_register_backend(my_backend_fn);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl DiagLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DiagLevel::Error,
            1 => DiagLevel::Warn,
            2 => DiagLevel::Info,
            _ => DiagLevel::Debug,
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(DiagLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: DiagLevel) -> bool {
    (level as u8) <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

/// Signature of a diag backend. The backend must write the formatted text;
/// it does not need to flush or add a trailing newline.
pub type DiagBackend = fn(fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "use the stderr fallback".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

fn stderr_backend(args: fmt::Arguments<'_>) {
    #[cfg(feature = "std")]
    {
        use std::io::Write;
        let _ = write!(std::io::stderr(), "{args}");
    }
    #[cfg(not(feature = "std"))]
    {
        let _ = args;
    }
}

#[inline]
fn dispatch(args: fmt::Arguments<'_>) {
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        stderr_backend(args);
    } else {
        // SAFETY: `diag_register_backend` only stores valid `DiagBackend`
        // fn pointers, which are the same size as `*mut ()` on every
        // supported host target.
        let backend: DiagBackend = unsafe { core::mem::transmute(ptr) };
        backend(args);
    }
}

/// Register a backend that replaces the stderr fallback.
pub fn diag_register_backend(backend: DiagBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

/// Remove any registered backend, reverting to the stderr fallback.
pub fn diag_reset_backend() {
    BACKEND.store(core::ptr::null_mut(), Ordering::Release);
}

pub fn diag_set_level(level: DiagLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn diag_get_level() -> DiagLevel {
    DiagLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

/// Emit a formatted diagnostic line at the given level.
pub fn log_args(level: DiagLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    dispatch(args);
}

#[macro_export]
macro_rules! diag {
    ($level:expr, $($arg:tt)*) => {{
        $crate::diag::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! diag_error {
    ($($arg:tt)*) => {
        $crate::diag::log_args($crate::diag::DiagLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_warn {
    ($($arg:tt)*) => {
        $crate::diag::log_args($crate::diag::DiagLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_info {
    ($($arg:tt)*) => {
        $crate::diag::log_args($crate::diag::DiagLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_debug {
    ($($arg:tt)*) => {
        $crate::diag::log_args($crate::diag::DiagLevel::Debug, ::core::format_args!($($arg)*))
    };
}
