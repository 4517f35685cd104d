//! Foreign-language entry surfaces.
//!
//! Each module emits one header wrapping the core `run` function for a host
//! language: [`cpp`] for native callers, [`python`] for buffer-protocol
//! hosts, [`java`] for managed runtimes with direct buffers.

pub mod cpp;
pub mod java;
pub mod python;

use vecpy_core::{ArgFilter, Kernel, Variable};

/// The argument whose buffer length defines `N`: the first elementwise,
/// non-stride pointer argument, falling back to the first pointer argument.
pub(crate) fn length_argument<'k>(kernel: &'k Kernel) -> Option<&'k Variable> {
    let pointers = kernel.arguments(ArgFilter {
        uniform: Some(false),
        ..Default::default()
    });
    pointers
        .iter()
        .find(|arg| arg.stride() == 1)
        .copied()
        .or_else(|| pointers.first().copied())
}
