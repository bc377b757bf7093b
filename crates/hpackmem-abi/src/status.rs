//! Integer status codes returned by the lifecycle entry points.

use std::ffi::{CStr, c_int};

use hpackmem_core::LifecycleError;

/// Success.
pub const HPACK_MEM_OK: c_int = 0;
/// A configuration is already active; call `hpack_mem_cleanup` first.
pub const HPACK_MEM_ERR_ALREADY_INITIALIZED: c_int = -1;
/// No configuration is active.
pub const HPACK_MEM_ERR_NOT_INITIALIZED: c_int = -2;
/// One of the three allocator function pointers was null; nothing installed.
pub const HPACK_MEM_ERR_NULL_CAPABILITY: c_int = -3;
/// A required out-pointer was null.
pub const HPACK_MEM_ERR_NULL_ARGUMENT: c_int = -4;

/// Maps a lifecycle result onto its status code.
#[must_use]
pub fn from_lifecycle(result: Result<(), LifecycleError>) -> c_int {
    match result {
        Ok(()) => HPACK_MEM_OK,
        Err(LifecycleError::AlreadyInitialized) => HPACK_MEM_ERR_ALREADY_INITIALIZED,
        Err(LifecycleError::NotInitialized) => HPACK_MEM_ERR_NOT_INITIALIZED,
    }
}

/// Human-readable name of a status code, backing `hpack_mem_strerror`.
#[must_use]
pub fn describe(status: c_int) -> &'static CStr {
    match status {
        HPACK_MEM_OK => c"ok",
        HPACK_MEM_ERR_ALREADY_INITIALIZED => c"already initialized",
        HPACK_MEM_ERR_NOT_INITIALIZED => c"not initialized",
        HPACK_MEM_ERR_NULL_CAPABILITY => c"null allocator capability",
        HPACK_MEM_ERR_NULL_ARGUMENT => c"null argument",
        _ => c"unknown status",
    }
}
