//! Allocator registry.
//!
//! Holds the active capability triple together with the lifecycle state
//! and routes every allocation request through it.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --initialize_with--> InitializedCustom  --cleanup--> Uninitialized
//! Uninitialized --initialize_default--> InitializedDefault --cleanup--> Uninitialized
//! ```
//!
//! There is no direct edge between the two initialized states. State and
//! capabilities share one `RwLock`: transitions check and set under the
//! write lock, and allocation calls hold a recursive read guard for the
//! duration of the delegated call, so a call never observes a half-swapped
//! configuration and a swap never happens underneath a running call.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, const_mutex, const_rwlock};
use serde::Serialize;

use crate::capability::{Capabilities, RawAllocator};
use crate::config::RegistryConfig;
use crate::error::{AllocError, LifecycleError};
use crate::lifecycle::{LifecycleLevel, LifecycleLog, LifecycleRecord};
use crate::metrics::{MetricsSnapshot, RegistryMetrics};

/// Registry lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    /// No configuration claimed; system defaults are bound.
    Uninitialized,
    /// A caller claimed the system defaults explicitly.
    InitializedDefault,
    /// A host allocator is installed.
    InitializedCustom,
}

impl RegistryState {
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::InitializedDefault => "initialized_default",
            Self::InitializedCustom => "initialized_custom",
        }
    }
}

struct Slot {
    state: RegistryState,
    capabilities: Capabilities,
    /// Bumped whenever the capability triple is replaced.
    epoch: u64,
}

/// Holder of the active allocator triple.
pub struct AllocatorRegistry {
    slot: RwLock<Slot>,
    metrics: RegistryMetrics,
    log: Mutex<LifecycleLog>,
    config: RegistryConfig,
}

impl AllocatorRegistry {
    /// Creates an uninitialized registry bound to the system allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_config(RegistryConfig::new())
    }

    #[must_use]
    pub const fn with_config(config: RegistryConfig) -> Self {
        Self {
            slot: const_rwlock(Slot {
                state: RegistryState::Uninitialized,
                capabilities: Capabilities::System,
                epoch: 0,
            }),
            metrics: RegistryMetrics::new(),
            log: const_mutex(LifecycleLog::new(config.log_capacity)),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Installs `allocator` as the active triple.
    ///
    /// Fails with [`LifecycleError::AlreadyInitialized`] unless the registry
    /// is uninitialized; on failure nothing is modified.
    pub fn initialize_with(&self, allocator: Arc<dyn RawAllocator>) -> Result<(), LifecycleError> {
        let name = allocator.name();
        let mut slot = self.slot.write();
        if slot.state.is_initialized() {
            let (state, active) = (slot.state, slot.capabilities.name());
            drop(slot);
            // The rejected allocator is dropped here, outside the lock.
            drop(allocator);
            self.reject("initialize_with", LifecycleError::AlreadyInitialized, state, active);
            return Err(LifecycleError::AlreadyInitialized);
        }
        slot.capabilities = Capabilities::Custom(allocator);
        slot.state = RegistryState::InitializedCustom;
        slot.epoch = slot.epoch.wrapping_add(1);
        let epoch = slot.epoch;
        drop(slot);

        RegistryMetrics::inc(&self.metrics.initializations);
        self.transition(
            "initialize_with",
            RegistryState::InitializedCustom,
            name,
            format!("prior=uninitialized;epoch={epoch}"),
        );
        Ok(())
    }

    /// Claims the system defaults without replacing them.
    pub fn initialize_default(&self) -> Result<(), LifecycleError> {
        let mut slot = self.slot.write();
        if slot.state.is_initialized() {
            let (state, active) = (slot.state, slot.capabilities.name());
            drop(slot);
            self.reject(
                "initialize_default",
                LifecycleError::AlreadyInitialized,
                state,
                active,
            );
            return Err(LifecycleError::AlreadyInitialized);
        }
        slot.state = RegistryState::InitializedDefault;
        let active = slot.capabilities.name();
        drop(slot);

        RegistryMetrics::inc(&self.metrics.initializations);
        self.transition(
            "initialize_default",
            RegistryState::InitializedDefault,
            active,
            "prior=uninitialized",
        );
        Ok(())
    }

    /// Restores the system defaults and returns to `Uninitialized`.
    ///
    /// Fails with [`LifecycleError::NotInitialized`] if no configuration is
    /// active.
    pub fn cleanup(&self) -> Result<(), LifecycleError> {
        let mut slot = self.slot.write();
        if !slot.state.is_initialized() {
            let active = slot.capabilities.name();
            drop(slot);
            self.reject(
                "cleanup",
                LifecycleError::NotInitialized,
                RegistryState::Uninitialized,
                active,
            );
            return Err(LifecycleError::NotInitialized);
        }
        let prior = slot.state;
        let previous = std::mem::take(&mut slot.capabilities);
        if previous.is_custom() {
            slot.epoch = slot.epoch.wrapping_add(1);
        }
        slot.state = RegistryState::Uninitialized;
        drop(slot);

        let released = previous.name();
        // Host allocator destructors run outside the lock.
        drop(previous);

        RegistryMetrics::inc(&self.metrics.cleanups);
        self.transition(
            "cleanup",
            RegistryState::Uninitialized,
            "system",
            format!("prior={};released={released}", prior.as_str()),
        );
        Ok(())
    }

    /// Returns true if a configuration (default or custom) is active.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slot.read_recursive().state.is_initialized()
    }

    #[must_use]
    pub fn state(&self) -> RegistryState {
        self.slot.read_recursive().state
    }

    /// Label of the allocator currently routed to.
    #[must_use]
    pub fn active_allocator(&self) -> &'static str {
        self.slot.read_recursive().capabilities.name()
    }

    /// Configuration generation; changes whenever the capability triple is
    /// replaced.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.slot.read_recursive().epoch
    }

    // -----------------------------------------------------------------------
    // Delegation
    // -----------------------------------------------------------------------

    /// Requests `size` bytes from the active allocator.
    ///
    /// `Ok(None)` means a zero-size request was answered without a block,
    /// which is success. A nonzero request without a block is
    /// [`AllocError::Exhausted`].
    pub fn allocate(&self, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        let block = {
            let slot = self.slot.read_recursive();
            slot.capabilities.as_raw().allocate(size)
        };
        RegistryMetrics::inc(&self.metrics.allocations);
        match block {
            Some(ptr) => Ok(Some(ptr)),
            None if size == 0 => {
                RegistryMetrics::inc(&self.metrics.zero_size_allocations);
                Ok(None)
            }
            None => {
                RegistryMetrics::inc(&self.metrics.allocation_failures);
                Err(self.failure("allocate", AllocError::Exhausted { requested: size }))
            }
        }
    }

    /// Resizes `ptr` to `new_size` bytes with realloc semantics.
    ///
    /// `None` input behaves as [`allocate`](Self::allocate). `Ok(None)` for a
    /// zero `new_size` means the block was released. On
    /// [`AllocError::Exhausted`] the input block is still live and owned by
    /// the caller.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block obtained from this registry under
    /// the configuration that is still active.
    pub unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let block = {
            let slot = self.slot.read_recursive();
            // SAFETY: caller guarantees ptr belongs to the active triple.
            unsafe { slot.capabilities.as_raw().reallocate(ptr, new_size) }
        };
        RegistryMetrics::inc(&self.metrics.reallocations);
        match block {
            Some(ptr) => Ok(Some(ptr)),
            None if new_size == 0 => Ok(None),
            None => {
                RegistryMetrics::inc(&self.metrics.reallocation_failures);
                Err(self.failure(
                    "reallocate",
                    AllocError::Exhausted {
                        requested: new_size,
                    },
                ))
            }
        }
    }

    /// Hands `ptr` back to the active allocator. `None` is a no-op and never
    /// reaches the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block obtained from this registry under
    /// the configuration that is still active.
    pub unsafe fn free(&self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            RegistryMetrics::inc(&self.metrics.null_frees);
            return;
        };
        {
            let slot = self.slot.read_recursive();
            // SAFETY: caller guarantees ptr belongs to the active triple.
            unsafe { slot.capabilities.as_raw().free(ptr) };
        }
        RegistryMetrics::inc(&self.metrics.frees);
    }

    /// [`allocate`](Self::allocate), then zero all `size` bytes of the block.
    pub fn allocate_zeroed(&self, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        let block = self.allocate(size)?;
        if let Some(ptr) = block {
            // SAFETY: RawAllocator guarantees the block spans `size` bytes.
            unsafe { self.zero_fill(ptr, 0, size) };
        }
        Ok(block)
    }

    /// [`reallocate`](Self::reallocate), then zero the grown tail
    /// `[orig_size, new_size)`. Bytes below `orig_size` are left untouched
    /// and nothing is filled when shrinking. With a `None` input the whole
    /// new block is zeroed.
    ///
    /// # Safety
    ///
    /// Same as [`reallocate`](Self::reallocate); additionally `orig_size`
    /// must not exceed the size the block was last allocated with.
    pub unsafe fn reallocate_zeroed(
        &self,
        ptr: Option<NonNull<u8>>,
        orig_size: usize,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let orig_size = if ptr.is_none() { 0 } else { orig_size };
        // SAFETY: forwarded caller contract.
        let block = unsafe { self.reallocate(ptr, new_size) }?;
        if let Some(ptr) = block {
            if new_size > orig_size {
                // SAFETY: the block spans `new_size` bytes.
                unsafe { self.zero_fill(ptr, orig_size, new_size) };
            }
        }
        Ok(block)
    }

    // -----------------------------------------------------------------------
    // Epoch-checked delegation (RegistryBuffer)
    // -----------------------------------------------------------------------
    //
    // Each helper holds one read guard across the epoch read or check and
    // the delegated call, so no transition can land in between. The inner
    // calls take nested `read_recursive` guards, which never wait on a
    // queued writer.

    /// [`allocate_zeroed`](Self::allocate_zeroed), also returning the epoch
    /// the block belongs to.
    pub(crate) fn allocate_zeroed_tagged(
        &self,
        size: usize,
    ) -> Result<(Option<NonNull<u8>>, u64), AllocError> {
        let slot = self.slot.read_recursive();
        let block = self.allocate_zeroed(size)?;
        Ok((block, slot.epoch))
    }

    /// [`reallocate_zeroed`](Self::reallocate_zeroed) if the configuration
    /// is still the one from `epoch`, else [`AllocError::StaleConfiguration`]
    /// without touching `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block of at least `orig_size` bytes
    /// obtained from this registry under `epoch`.
    pub(crate) unsafe fn reallocate_zeroed_in_epoch(
        &self,
        epoch: u64,
        ptr: Option<NonNull<u8>>,
        orig_size: usize,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let slot = self.slot.read_recursive();
        if slot.epoch != epoch {
            return Err(AllocError::StaleConfiguration);
        }
        // SAFETY: the guard pins the configuration that produced ptr.
        unsafe { self.reallocate_zeroed(ptr, orig_size, new_size) }
    }

    /// Frees `ptr` if the configuration is still the one from `epoch`.
    /// Returns false, leaving `ptr` untouched, if it was replaced.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this registry under `epoch`.
    pub(crate) unsafe fn free_in_epoch(&self, epoch: u64, ptr: NonNull<u8>) -> bool {
        let slot = self.slot.read_recursive();
        if slot.epoch != epoch {
            return false;
        }
        // SAFETY: the guard pins the configuration that produced ptr.
        unsafe { self.free(Some(ptr)) };
        true
    }

    /// Zeroes `[start, end)` of `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `end` bytes.
    unsafe fn zero_fill(&self, ptr: NonNull<u8>, start: usize, end: usize) {
        let len = end.saturating_sub(start);
        if len == 0 {
            return;
        }
        // SAFETY: caller guarantees the range is in bounds.
        unsafe { ptr.as_ptr().add(start).write_bytes(0, len) };
        RegistryMetrics::inc(&self.metrics.zero_fills);
        RegistryMetrics::add(&self.metrics.zeroed_bytes, len as u64);
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn raw_metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Retained lifecycle records, oldest first.
    #[must_use]
    pub fn lifecycle_logs(&self) -> Vec<LifecycleRecord> {
        self.log.lock().snapshot()
    }

    /// Removes and returns the retained lifecycle records.
    pub fn drain_lifecycle_logs(&self) -> Vec<LifecycleRecord> {
        self.log.lock().drain()
    }

    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    fn transition(
        &self,
        symbol: &'static str,
        state: RegistryState,
        allocator: &'static str,
        details: impl Into<String>,
    ) {
        if !self.config.effective_log_mode().records_transitions() {
            return;
        }
        let record = LifecycleRecord::new(
            LifecycleLevel::Info,
            symbol,
            "transition",
            "success",
            state,
            allocator,
        )
        .with_details(details);
        self.log.lock().push(record);
    }

    fn reject(
        &self,
        symbol: &'static str,
        error: LifecycleError,
        state: RegistryState,
        allocator: &'static str,
    ) {
        RegistryMetrics::inc(&self.metrics.rejected_transitions);
        if !self.config.effective_log_mode().records_transitions() {
            return;
        }
        let outcome = match error {
            LifecycleError::AlreadyInitialized => "already_initialized",
            LifecycleError::NotInitialized => "not_initialized",
        };
        let record = LifecycleRecord::new(
            LifecycleLevel::Warn,
            symbol,
            "rejected_transition",
            outcome,
            state,
            allocator,
        )
        .with_details(error.to_string());
        self.log.lock().push(record);
    }

    /// Records `error` in verbose mode and hands it back.
    fn failure(&self, symbol: &'static str, error: AllocError) -> AllocError {
        if !self.config.effective_log_mode().records_failures() {
            return error;
        }
        let (state, allocator) = {
            let slot = self.slot.read_recursive();
            (slot.state, slot.capabilities.name())
        };
        let record = LifecycleRecord::new(
            LifecycleLevel::Warn,
            symbol,
            "alloc_failure",
            "exhausted",
            state,
            allocator,
        )
        .with_details(match error.requested() {
            Some(requested) => format!("requested={requested}"),
            None => error.to_string(),
        });
        self.log.lock().push(record);
        error
    }
}

impl Default for AllocatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AllocatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read_recursive();
        f.debug_struct("AllocatorRegistry")
            .field("state", &slot.state)
            .field("capabilities", &slot.capabilities)
            .field("epoch", &slot.epoch)
            .finish_non_exhaustive()
    }
}
