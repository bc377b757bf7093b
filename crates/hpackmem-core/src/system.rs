//! Platform default allocator.
//!
//! Thin wrapper over `libc::{malloc, realloc, free}`. Zero-size requests are
//! answered without touching the platform allocator, and `reallocate(p, 0)`
//! releases `p` instead of relying on the implementation-defined
//! `realloc(p, 0)`.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::capability::RawAllocator;

/// libc-backed allocator triple.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemAllocator;

// SAFETY: malloc/realloc/free satisfy the C allocator contract.
unsafe impl RawAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        // SAFETY: malloc has no preconditions.
        NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())
    }

    unsafe fn reallocate(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        if new_size == 0 {
            if let Some(ptr) = ptr {
                // SAFETY: caller guarantees ptr is a live malloc block.
                unsafe { libc::free(ptr.as_ptr().cast::<c_void>()) };
            }
            return None;
        }
        let raw = ptr.map_or(std::ptr::null_mut(), |p| p.as_ptr().cast::<c_void>());
        // SAFETY: raw is null or a live malloc block.
        NonNull::new(unsafe { libc::realloc(raw, new_size) }.cast::<u8>())
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees ptr is a live malloc block.
        unsafe { libc::free(ptr.as_ptr().cast::<c_void>()) };
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
