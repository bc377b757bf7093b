//! Allocator capability triple.
//!
//! The three primitives (allocate, reallocate, free) are always handled as
//! one value. A registry swaps a whole [`Capabilities`] at once, so no caller
//! can pair one allocator's `allocate` with another allocator's `free`.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::system::SystemAllocator;

/// A malloc-style allocator exposed as three primitives.
///
/// # Safety
///
/// Implementors must uphold the C allocator contract:
/// - a block returned for a request of `n` bytes is valid for reads and
///   writes of at least `n` bytes and aligned for any fundamental type;
/// - `reallocate` keeps the first `min(old, new)` bytes of the block, and on
///   failure (no block for a nonzero `new_size`) leaves the input block live;
/// - `reallocate` and `free` accept every block this allocator handed out.
pub unsafe trait RawAllocator: Send + Sync {
    /// Returns a block of at least `size` bytes. `None` for `size == 0` is
    /// permitted and is not a failure.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resizes `ptr` to `new_size` bytes. `None` input behaves as `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block obtained from this allocator.
    unsafe fn reallocate(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>>;

    /// Releases `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this allocator.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Short label used in lifecycle records.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// The capability triple a registry currently routes through.
#[derive(Clone, Default)]
pub enum Capabilities {
    /// Platform allocator.
    #[default]
    System,
    /// Host-supplied allocator.
    Custom(Arc<dyn RawAllocator>),
}

impl Capabilities {
    /// Wraps a host allocator.
    #[must_use]
    pub fn custom(allocator: impl RawAllocator + 'static) -> Self {
        Self::Custom(Arc::new(allocator))
    }

    /// Returns true when a host allocator is installed.
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Label of the underlying allocator.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.as_raw().name()
    }

    /// Borrows the triple as a trait object.
    #[must_use]
    pub fn as_raw(&self) -> &dyn RawAllocator {
        match self {
            Self::System => &SystemAllocator,
            Self::Custom(allocator) => allocator.as_ref(),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("Capabilities::System"),
            Self::Custom(allocator) => write!(f, "Capabilities::Custom({})", allocator.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_system() {
        let caps = Capabilities::default();
        assert!(!caps.is_custom());
        assert_eq!(caps.name(), "system");
        assert_eq!(format!("{caps:?}"), "Capabilities::System");
    }

    #[test]
    fn custom_reports_allocator_name() {
        let caps = Capabilities::custom(SystemAllocator);
        assert!(caps.is_custom());
        assert_eq!(caps.name(), "system");
        assert_eq!(format!("{caps:?}"), "Capabilities::Custom(system)");
    }
}
