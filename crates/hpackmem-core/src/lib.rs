//! # hpackmem-core
//!
//! Pluggable allocator indirection for the HPACK component.
//!
//! Every heap block the component needs is obtained through an
//! [`AllocatorRegistry`]. A host may install its own allocate/reallocate/free
//! triple once per session; until then (and after cleanup) the registry
//! routes to the platform allocator.
//!
//! # Architecture
//!
//! ```text
//! consumer -> AllocatorRegistry (state + capability triple) -> RawAllocator
//!                    |                                          |
//!                 metrics / lifecycle log              SystemAllocator | host triple
//! ```
//!
//! - **Capabilities** (`capability`): the allocator triple as one value
//! - **System allocator** (`system`): libc-backed default triple
//! - **Registry** (`registry`): lifecycle state machine and delegation
//! - **Buffer** (`buffer`): owned zero-initialized storage drawn from a registry
//! - **Configuration** (`config`): lifecycle log mode and capacity
//! - **Metrics** (`metrics`): atomic counters for observability
//! - **Lifecycle log** (`lifecycle`): structured transition records

#![deny(unsafe_code)]

pub mod buffer;
pub mod capability;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod system;

pub use buffer::RegistryBuffer;
pub use capability::{Capabilities, RawAllocator};
pub use config::{LifecycleLogMode, RegistryConfig};
pub use error::{AllocError, LifecycleError};
pub use lifecycle::{LifecycleLevel, LifecycleRecord};
pub use metrics::{MetricsSnapshot, RegistryMetrics};
pub use registry::{AllocatorRegistry, RegistryState};
pub use system::SystemAllocator;
