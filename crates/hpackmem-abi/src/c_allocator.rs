//! Host allocator triple supplied as C function pointers.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use hpackmem_core::RawAllocator;

/// `void *(*)(size_t)`
pub type MallocFn = unsafe extern "C" fn(size: usize) -> *mut c_void;
/// `void *(*)(void *, size_t)`
pub type ReallocFn = unsafe extern "C" fn(ptr: *mut c_void, size: usize) -> *mut c_void;
/// `void (*)(void *)`
pub type FreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// Three host functions bundled as one capability value.
#[derive(Clone, Copy)]
pub struct CAllocator {
    malloc: MallocFn,
    realloc: ReallocFn,
    free: FreeFn,
}

impl CAllocator {
    /// Bundles the triple. Returns `None` if any pointer is null, so a
    /// partially configured triple can never be built.
    ///
    /// # Safety
    ///
    /// The functions must implement the C allocator contract (`malloc`,
    /// `realloc`, `free` semantics, fundamental alignment) and stay callable
    /// from any thread for as long as the triple is installed.
    #[must_use]
    pub unsafe fn from_raw(
        malloc: Option<MallocFn>,
        realloc: Option<ReallocFn>,
        free: Option<FreeFn>,
    ) -> Option<Self> {
        Some(Self {
            malloc: malloc?,
            realloc: realloc?,
            free: free?,
        })
    }
}

// SAFETY: the host vouched for the C allocator contract in `from_raw`.
unsafe impl RawAllocator for CAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: host malloc accepts any size, including 0.
        NonNull::new(unsafe { (self.malloc)(size) }.cast::<u8>())
    }

    unsafe fn reallocate(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        let raw = ptr.map_or(std::ptr::null_mut(), |p| p.as_ptr().cast::<c_void>());
        // SAFETY: raw is null or a live block of this host allocator.
        NonNull::new(unsafe { (self.realloc)(raw, new_size) }.cast::<u8>())
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: ptr is a live block of this host allocator.
        unsafe { (self.free)(ptr.as_ptr().cast::<c_void>()) };
    }

    fn name(&self) -> &'static str {
        "c-host"
    }
}

impl fmt::Debug for CAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CAllocator")
            .field("malloc", &(self.malloc as usize as *const c_void))
            .field("realloc", &(self.realloc as usize as *const c_void))
            .field("free", &(self.free as usize as *const c_void))
            .finish()
    }
}
