//! Owned zero-initialized storage drawn from a registry.
//!
//! [`RegistryBuffer`] is the safe consumer of the zeroed helpers: it is
//! created with [`AllocatorRegistry::allocate_zeroed`], resized with
//! [`AllocatorRegistry::reallocate_zeroed`] and handed back with
//! [`AllocatorRegistry::free`] on drop.
//!
//! A buffer remembers the registry epoch it was allocated under. If the
//! registry is reconfigured while the buffer is live, the block belongs to
//! an allocator that is no longer reachable: resizing fails with
//! [`AllocError::StaleConfiguration`] and dropping leaks the block instead
//! of passing it to the wrong allocator. The epoch check and the delegated
//! call run under a single registry read guard, so a concurrent transition
//! lands either before or after, never between.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

use crate::error::AllocError;
use crate::metrics::RegistryMetrics;
use crate::registry::AllocatorRegistry;

/// Growable zero-initialized byte buffer backed by a registry.
pub struct RegistryBuffer<'r> {
    registry: &'r AllocatorRegistry,
    ptr: Option<NonNull<u8>>,
    len: usize,
    epoch: u64,
}

impl<'r> RegistryBuffer<'r> {
    /// Allocates `len` zeroed bytes from `registry`.
    pub fn zeroed(registry: &'r AllocatorRegistry, len: usize) -> Result<Self, AllocError> {
        let (ptr, epoch) = registry.allocate_zeroed_tagged(len)?;
        Ok(Self {
            registry,
            ptr,
            len,
            epoch,
        })
    }

    /// Resizes to `new_len` bytes. Growth zero-fills the new tail; existing
    /// bytes up to `min(len, new_len)` are kept. On error the buffer is
    /// unchanged.
    pub fn resize_zeroed(&mut self, new_len: usize) -> Result<(), AllocError> {
        if new_len == self.len {
            return Ok(());
        }
        // SAFETY: ptr is None or a live block of `len` bytes allocated under
        // `self.epoch`; the registry rejects the call if that has changed.
        let ptr = unsafe {
            self.registry
                .reallocate_zeroed_in_epoch(self.epoch, self.ptr, self.len, new_len)
        }?;
        self.ptr = ptr;
        self.len = new_len;
        Ok(())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: the block spans `len` initialized bytes.
            Some(ptr) if self.len > 0 => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            _ => &[],
        }
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: the block spans `len` initialized bytes and is uniquely owned.
            Some(ptr) if self.len > 0 => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len)
            },
            _ => &mut [],
        }
    }

    /// Returns true if the registry was reconfigured since allocation.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.registry.epoch() != self.epoch
    }
}

impl Drop for RegistryBuffer<'_> {
    fn drop(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };
        // SAFETY: ptr is a live block allocated under `self.epoch`.
        if !unsafe { self.registry.free_in_epoch(self.epoch, ptr) } {
            RegistryMetrics::inc(&self.registry.raw_metrics().stale_buffer_leaks);
        }
    }
}

impl fmt::Debug for RegistryBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuffer")
            .field("len", &self.len)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
