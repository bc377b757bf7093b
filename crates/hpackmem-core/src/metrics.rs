//! Atomic counters for registry observability.
//!
//! All counters use relaxed ordering; they are advisory/diagnostic,
//! not synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-registry operation counters.
pub struct RegistryMetrics {
    /// `allocate` calls (including zeroed allocations).
    pub allocations: AtomicU64,
    /// Zero-size requests answered without a block.
    pub zero_size_allocations: AtomicU64,
    /// Nonzero `allocate` requests the active allocator could not serve.
    pub allocation_failures: AtomicU64,
    /// `reallocate` calls (including zeroed reallocations).
    pub reallocations: AtomicU64,
    /// Nonzero `reallocate` requests the active allocator could not serve.
    pub reallocation_failures: AtomicU64,
    /// Blocks handed back to the active allocator.
    pub frees: AtomicU64,
    /// `free(None)` calls.
    pub null_frees: AtomicU64,
    /// Zero-fill passes performed by the zeroed helpers.
    pub zero_fills: AtomicU64,
    /// Bytes written by zero-fill passes.
    pub zeroed_bytes: AtomicU64,
    /// Successful `initialize_with` / `initialize_default` calls.
    pub initializations: AtomicU64,
    /// Successful `cleanup` calls.
    pub cleanups: AtomicU64,
    /// Lifecycle calls rejected with `AlreadyInitialized` / `NotInitialized`.
    pub rejected_transitions: AtomicU64,
    /// Buffers leaked on drop because the registry was reconfigured.
    pub stale_buffer_leaks: AtomicU64,
}

impl RegistryMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            zero_size_allocations: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            reallocations: AtomicU64::new(0),
            reallocation_failures: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            null_frees: AtomicU64::new(0),
            zero_fills: AtomicU64::new(0),
            zeroed_bytes: AtomicU64::new(0),
            initializations: AtomicU64::new(0),
            cleanups: AtomicU64::new(0),
            rejected_transitions: AtomicU64::new(0),
            stale_buffer_leaks: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations: Self::get(&self.allocations),
            zero_size_allocations: Self::get(&self.zero_size_allocations),
            allocation_failures: Self::get(&self.allocation_failures),
            reallocations: Self::get(&self.reallocations),
            reallocation_failures: Self::get(&self.reallocation_failures),
            frees: Self::get(&self.frees),
            null_frees: Self::get(&self.null_frees),
            zero_fills: Self::get(&self.zero_fills),
            zeroed_bytes: Self::get(&self.zeroed_bytes),
            initializations: Self::get(&self.initializations),
            cleanups: Self::get(&self.cleanups),
            rejected_transitions: Self::get(&self.rejected_transitions),
            stale_buffer_leaks: Self::get(&self.stale_buffer_leaks),
        }
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = RegistryMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_works() {
        let m = RegistryMetrics::new();
        RegistryMetrics::inc(&m.allocations);
        RegistryMetrics::inc(&m.allocations);
        RegistryMetrics::add(&m.zeroed_bytes, 40);
        let snap = m.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.zeroed_bytes, 40);
        assert_eq!(snap.frees, 0);
    }

    #[test]
    fn snapshot_serializes_every_counter() {
        let value = serde_json::to_value(RegistryMetrics::new().snapshot()).expect("serialize");
        let obj = value.as_object().expect("object");
        assert_eq!(obj.len(), 13);
        assert_eq!(obj["rejected_transitions"], 0);
    }
}
