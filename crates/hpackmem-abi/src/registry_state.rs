//! The process-wide registry behind the C entry points.

use hpackmem_core::AllocatorRegistry;

static GLOBAL_REGISTRY: AllocatorRegistry = AllocatorRegistry::new();

/// Access the process-wide registry.
///
/// Rust code linked into the same process allocates through this handle so
/// it shares the configuration installed by the C host.
#[must_use]
pub fn global_registry() -> &'static AllocatorRegistry {
    &GLOBAL_REGISTRY
}
