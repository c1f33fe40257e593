#![cfg_attr(not(feature = "std"), no_std)]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod alignment;
pub mod diag;

pub use alignment::{align_down_u64, align_down_usize, align_up_u64, align_up_usize};
pub use alignment::{align_down_usize as align_down, align_up_usize as align_up};
pub use diag::{
    DiagLevel, diag_get_level, diag_register_backend, diag_reset_backend, diag_set_level,
};

#[doc(hidden)]
pub use paste;
