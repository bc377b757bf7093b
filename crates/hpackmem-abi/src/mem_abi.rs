//! ABI layer for the allocator registry (`hpack_mem_*`).
//!
//! Lifecycle entry points return status codes from [`crate::status`].
//! Allocation entry points follow the C convention: null means either a
//! zero-size request answered without a block or an allocation failure;
//! the registry metrics keep the two apart.

use std::ffi::{c_char, c_int, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

use hpackmem_core::MetricsSnapshot;

use crate::c_allocator::{CAllocator, FreeFn, MallocFn, ReallocFn};
use crate::registry_state::global_registry;
use crate::status::{self, HPACK_MEM_ERR_NULL_ARGUMENT, HPACK_MEM_ERR_NULL_CAPABILITY, HPACK_MEM_OK};

#[inline]
fn to_c(block: Option<NonNull<u8>>) -> *mut c_void {
    block.map_or(std::ptr::null_mut(), |p| p.as_ptr().cast::<c_void>())
}

#[inline]
fn from_c(ptr: *mut c_void) -> Option<NonNull<u8>> {
    NonNull::new(ptr.cast::<u8>())
}

// ---------------------------------------------------------------------------
// lifecycle
// ---------------------------------------------------------------------------

/// Installs a host allocator triple.
///
/// Returns `HPACK_MEM_OK`, `HPACK_MEM_ERR_ALREADY_INITIALIZED` if a
/// configuration is active, or `HPACK_MEM_ERR_NULL_CAPABILITY` if any of the
/// three pointers is null. Nothing is installed on error.
///
/// # Safety
///
/// The three functions must behave like `malloc`/`realloc`/`free` and stay
/// callable from any thread until `hpack_mem_cleanup` returns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hpack_mem_init_with(
    malloc_fn: Option<MallocFn>,
    realloc_fn: Option<ReallocFn>,
    free_fn: Option<FreeFn>,
) -> c_int {
    // SAFETY: forwarded host contract.
    let Some(allocator) = (unsafe { CAllocator::from_raw(malloc_fn, realloc_fn, free_fn) }) else {
        return HPACK_MEM_ERR_NULL_CAPABILITY;
    };
    status::from_lifecycle(global_registry().initialize_with(Arc::new(allocator)))
}

/// Claims the platform allocator as the active configuration.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_init() -> c_int {
    status::from_lifecycle(global_registry().initialize_default())
}

/// Restores the platform allocator and returns to the uninitialized state.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_cleanup() -> c_int {
    status::from_lifecycle(global_registry().cleanup())
}

/// Returns 1 if a configuration is active, 0 otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_is_initialized() -> c_int {
    c_int::from(global_registry().is_initialized())
}

// ---------------------------------------------------------------------------
// allocation
// ---------------------------------------------------------------------------

/// Allocates `size` bytes through the active allocator.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_malloc(size: usize) -> *mut c_void {
    global_registry().allocate(size).map_or(std::ptr::null_mut(), to_c)
}

/// Resizes `ptr` with `realloc` semantics. On a null result for a nonzero
/// `size`, `ptr` is still valid.
///
/// # Safety
///
/// `ptr` must be null or a live block from `hpack_mem_*` under the active
/// configuration.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hpack_mem_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    unsafe { global_registry().reallocate(from_c(ptr), size) }.map_or(std::ptr::null_mut(), to_c)
}

/// Releases `ptr`. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live block from `hpack_mem_*` under the active
/// configuration.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hpack_mem_free(ptr: *mut c_void) {
    // SAFETY: forwarded caller contract.
    unsafe { global_registry().free(from_c(ptr)) };
}

/// Allocates `size` zeroed bytes.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_malloc_zero(size: usize) -> *mut c_void {
    global_registry()
        .allocate_zeroed(size)
        .map_or(std::ptr::null_mut(), to_c)
}

/// Resizes `ptr` to `new_size`, zeroing `[orig_size, new_size)` on growth.
///
/// # Safety
///
/// Same as [`hpack_mem_realloc`]; `orig_size` must not exceed the current
/// size of the block.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hpack_mem_realloc_zero(
    ptr: *mut c_void,
    orig_size: usize,
    new_size: usize,
) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    unsafe { global_registry().reallocate_zeroed(from_c(ptr), orig_size, new_size) }
        .map_or(std::ptr::null_mut(), to_c)
}

// ---------------------------------------------------------------------------
// diagnostics
// ---------------------------------------------------------------------------

/// Registry counters in C layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HpackMemStats {
    pub allocations: u64,
    pub zero_size_allocations: u64,
    pub allocation_failures: u64,
    pub reallocations: u64,
    pub reallocation_failures: u64,
    pub frees: u64,
    pub null_frees: u64,
    pub zero_fills: u64,
    pub zeroed_bytes: u64,
    pub initializations: u64,
    pub cleanups: u64,
    pub rejected_transitions: u64,
    pub stale_buffer_leaks: u64,
}

impl From<MetricsSnapshot> for HpackMemStats {
    fn from(snap: MetricsSnapshot) -> Self {
        Self {
            allocations: snap.allocations,
            zero_size_allocations: snap.zero_size_allocations,
            allocation_failures: snap.allocation_failures,
            reallocations: snap.reallocations,
            reallocation_failures: snap.reallocation_failures,
            frees: snap.frees,
            null_frees: snap.null_frees,
            zero_fills: snap.zero_fills,
            zeroed_bytes: snap.zeroed_bytes,
            initializations: snap.initializations,
            cleanups: snap.cleanups,
            rejected_transitions: snap.rejected_transitions,
            stale_buffer_leaks: snap.stale_buffer_leaks,
        }
    }
}

/// Copies the registry counters into `*out`.
///
/// # Safety
///
/// `out` must be null or valid for a write of `HpackMemStats`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hpack_mem_stats(out: *mut HpackMemStats) -> c_int {
    if out.is_null() {
        return HPACK_MEM_ERR_NULL_ARGUMENT;
    }
    let stats = HpackMemStats::from(global_registry().metrics());
    // SAFETY: out is non-null and the caller guarantees it is writable.
    unsafe { out.write(stats) };
    HPACK_MEM_OK
}

/// Static NUL-terminated description of a status code. Never null; the
/// string must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn hpack_mem_strerror(status: c_int) -> *const c_char {
    status::describe(status).as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_conversions() {
        assert!(from_c(std::ptr::null_mut()).is_none());
        assert!(to_c(None).is_null());
    }

    #[test]
    fn stats_conversion_copies_counters() {
        let snap = MetricsSnapshot {
            allocations: 3,
            frees: 2,
            null_frees: 1,
            rejected_transitions: 4,
            zeroed_bytes: 64,
            stale_buffer_leaks: 2,
            ..MetricsSnapshot::default()
        };
        let stats = HpackMemStats::from(snap);
        assert_eq!(stats.zeroed_bytes, 64);
        assert_eq!(stats.stale_buffer_leaks, 2);
        assert_eq!(stats.zero_fills, 0);
        assert_eq!(stats.allocations, 3);
        assert_eq!(stats.frees, 2);
        assert_eq!(stats.null_frees, 1);
        assert_eq!(stats.rejected_transitions, 4);
        assert_eq!(stats.cleanups, 0);
    }

    #[test]
    fn stats_rejects_null_out_pointer() {
        // SAFETY: null is explicitly handled.
        assert_eq!(
            unsafe { hpack_mem_stats(std::ptr::null_mut()) },
            HPACK_MEM_ERR_NULL_ARGUMENT
        );
    }

    #[test]
    fn strerror_names_every_code() {
        use std::ffi::CStr;
        // SAFETY: hpack_mem_strerror returns static NUL-terminated strings.
        let text = |code| unsafe { CStr::from_ptr(hpack_mem_strerror(code)) };
        assert_eq!(text(HPACK_MEM_OK).to_str().unwrap(), "ok");
        assert_eq!(text(HPACK_MEM_ERR_NULL_CAPABILITY).to_str().unwrap(), "null allocator capability");
        assert_eq!(text(-99).to_str().unwrap(), "unknown status");
    }
}
