// Every extern "C" export takes raw pointers from C callers; the contract is
// the C allocator contract documented on each function.
#![allow(clippy::missing_safety_doc)]
//! # hpackmem-abi
//!
//! `extern "C"` boundary for the hpackmem allocator registry.
//!
//! This crate produces a `cdylib` exposing one process-wide
//! [`AllocatorRegistry`](hpackmem_core::AllocatorRegistry) to C hosts. A host
//! installs its allocator triple once at startup (`hpack_mem_init_with`) or
//! claims the defaults (`hpack_mem_init`); every HPACK allocation then goes
//! through `hpack_mem_malloc` / `hpack_mem_realloc` / `hpack_mem_free`.
//!
//! # Architecture
//!
//! ```text
//! C caller -> ABI entry (this crate) -> global AllocatorRegistry -> CAllocator | SystemAllocator
//! ```
//!
//! Lifecycle errors become integer status codes (see [`status`]); allocation
//! failures become null pointers, as C expects.

pub mod c_allocator;
pub mod mem_abi;
mod registry_state;
pub mod status;

pub use c_allocator::{CAllocator, FreeFn, MallocFn, ReallocFn};
pub use registry_state::global_registry;
