//! Contract tests for the `hpack_mem_*` C entry points.
//!
//! All tests share the process-wide registry, so each one holds `TEST_LOCK`
//! and starts from a reset registry.

use std::ffi::{CStr, c_int, c_void};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use hpackmem_abi::global_registry;
use hpackmem_abi::mem_abi::{
    HpackMemStats, hpack_mem_cleanup, hpack_mem_free, hpack_mem_init, hpack_mem_init_with,
    hpack_mem_is_initialized, hpack_mem_malloc, hpack_mem_malloc_zero, hpack_mem_realloc,
    hpack_mem_realloc_zero, hpack_mem_stats, hpack_mem_strerror,
};
use hpackmem_abi::status::{
    HPACK_MEM_ERR_ALREADY_INITIALIZED, HPACK_MEM_ERR_NOT_INITIALIZED,
    HPACK_MEM_ERR_NULL_CAPABILITY, HPACK_MEM_OK,
};
use hpackmem_core::RegistryState;

static TEST_LOCK: Mutex<()> = Mutex::new(());

static HOST_MALLOCS: AtomicUsize = AtomicUsize::new(0);
static HOST_REALLOCS: AtomicUsize = AtomicUsize::new(0);
static HOST_FREES: AtomicUsize = AtomicUsize::new(0);
static HOST_LAST_MALLOC_SIZE: AtomicUsize = AtomicUsize::new(0);
static HOST_LAST_FREE_PTR: AtomicUsize = AtomicUsize::new(0);

static ALT_MALLOCS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn host_malloc(size: usize) -> *mut c_void {
    HOST_MALLOCS.fetch_add(1, Ordering::SeqCst);
    HOST_LAST_MALLOC_SIZE.store(size, Ordering::SeqCst);
    if size == 0 {
        return std::ptr::null_mut();
    }
    // SAFETY: plain libc malloc.
    unsafe { libc::malloc(size) }
}

unsafe extern "C" fn host_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    HOST_REALLOCS.fetch_add(1, Ordering::SeqCst);
    // SAFETY: ptr is null or a libc block.
    unsafe { libc::realloc(ptr, size) }
}

unsafe extern "C" fn host_free(ptr: *mut c_void) {
    HOST_FREES.fetch_add(1, Ordering::SeqCst);
    HOST_LAST_FREE_PTR.store(ptr as usize, Ordering::SeqCst);
    // SAFETY: ptr is null or a libc block.
    unsafe { libc::free(ptr) }
}

unsafe extern "C" fn alt_malloc(size: usize) -> *mut c_void {
    ALT_MALLOCS.fetch_add(1, Ordering::SeqCst);
    // SAFETY: plain libc malloc.
    unsafe { libc::malloc(size.max(1)) }
}

unsafe extern "C" fn failing_malloc(_size: usize) -> *mut c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn failing_realloc(_ptr: *mut c_void, _size: usize) -> *mut c_void {
    std::ptr::null_mut()
}

fn reset() {
    let _ = hpack_mem_cleanup();
    for counter in [
        &HOST_MALLOCS,
        &HOST_REALLOCS,
        &HOST_FREES,
        &HOST_LAST_MALLOC_SIZE,
        &HOST_LAST_FREE_PTR,
        &ALT_MALLOCS,
    ] {
        counter.store(0, Ordering::SeqCst);
    }
    assert_eq!(hpack_mem_is_initialized(), 0);
}

fn install_host() -> c_int {
    // SAFETY: host functions wrap libc.
    unsafe { hpack_mem_init_with(Some(host_malloc), Some(host_realloc), Some(host_free)) }
}

fn stats() -> HpackMemStats {
    let mut out = HpackMemStats::default();
    // SAFETY: out is a valid stack slot.
    assert_eq!(unsafe { hpack_mem_stats(&mut out) }, HPACK_MEM_OK);
    out
}

#[test]
fn init_with_then_double_init_reports_already_initialized() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();

    assert_eq!(install_host(), HPACK_MEM_OK);
    assert_eq!(hpack_mem_is_initialized(), 1);
    // SAFETY: alt functions wrap libc.
    let second = unsafe { hpack_mem_init_with(Some(alt_malloc), Some(host_realloc), Some(host_free)) };
    assert_eq!(second, HPACK_MEM_ERR_ALREADY_INITIALIZED);
    assert_eq!(hpack_mem_init(), HPACK_MEM_ERR_ALREADY_INITIALIZED);

    // SAFETY: block comes from the active configuration.
    unsafe {
        let p = hpack_mem_malloc(32);
        assert!(!p.is_null());
        hpack_mem_free(p);
    }
    assert_eq!(HOST_MALLOCS.load(Ordering::SeqCst), 1);
    assert_eq!(ALT_MALLOCS.load(Ordering::SeqCst), 0);

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn cleanup_without_init_reports_not_initialized() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_ERR_NOT_INITIALIZED);
    assert_eq!(hpack_mem_init(), HPACK_MEM_OK);
    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_ERR_NOT_INITIALIZED);
}

#[test]
fn null_capability_is_rejected_without_mutation() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();

    // SAFETY: incomplete triples are rejected before installation.
    unsafe {
        assert_eq!(
            hpack_mem_init_with(None, Some(host_realloc), Some(host_free)),
            HPACK_MEM_ERR_NULL_CAPABILITY
        );
        assert_eq!(
            hpack_mem_init_with(Some(host_malloc), None, Some(host_free)),
            HPACK_MEM_ERR_NULL_CAPABILITY
        );
        assert_eq!(
            hpack_mem_init_with(Some(host_malloc), Some(host_realloc), None),
            HPACK_MEM_ERR_NULL_CAPABILITY
        );
    }
    assert_eq!(hpack_mem_is_initialized(), 0);
    assert_eq!(global_registry().state(), RegistryState::Uninitialized);
    assert_eq!(global_registry().active_allocator(), "system");
}

#[test]
fn counting_host_sees_one_malloc_and_one_free_then_cleanup_detaches_it() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    assert_eq!(install_host(), HPACK_MEM_OK);

    let p = hpack_mem_malloc(16);
    assert!(!p.is_null());
    // SAFETY: same block.
    unsafe { hpack_mem_free(p) };

    assert_eq!(HOST_MALLOCS.load(Ordering::SeqCst), 1);
    assert_eq!(HOST_LAST_MALLOC_SIZE.load(Ordering::SeqCst), 16);
    assert_eq!(HOST_FREES.load(Ordering::SeqCst), 1);
    assert_eq!(HOST_LAST_FREE_PTR.load(Ordering::SeqCst), p as usize);

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
    // SAFETY: block comes from the restored defaults.
    unsafe {
        let q = hpack_mem_malloc(16);
        assert!(!q.is_null());
        hpack_mem_free(q);
    }
    assert_eq!(HOST_MALLOCS.load(Ordering::SeqCst), 1);
    assert_eq!(HOST_FREES.load(Ordering::SeqCst), 1);
}

#[test]
fn free_null_never_reaches_host() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    assert_eq!(install_host(), HPACK_MEM_OK);

    let before = stats();
    // SAFETY: null is always accepted.
    unsafe { hpack_mem_free(std::ptr::null_mut()) };
    assert_eq!(HOST_FREES.load(Ordering::SeqCst), 0);
    assert_eq!(stats().null_frees, before.null_frees + 1);

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn zero_size_malloc_is_null_but_counted_as_success() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();

    let before = stats();
    let p = hpack_mem_malloc(0);
    assert!(p.is_null());
    let after = stats();
    assert_eq!(after.zero_size_allocations, before.zero_size_allocations + 1);
    assert_eq!(after.allocation_failures, before.allocation_failures);
}

#[test]
fn failing_host_returns_null_and_keeps_original_block() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();

    // A block from the defaults, kept across a failed realloc below.
    let p = hpack_mem_malloc(8);
    assert!(!p.is_null());
    // SAFETY: p is a live 8-byte block.
    unsafe { p.cast::<u8>().write_bytes(0x3C, 8) };

    let before = stats();
    // SAFETY: realloc to an impossible size fails and leaves p live.
    let q = unsafe { hpack_mem_realloc(p, usize::MAX) };
    assert!(q.is_null());
    // SAFETY: p is still live.
    unsafe {
        assert_eq!(*p.cast::<u8>().add(7), 0x3C);
        hpack_mem_free(p);
    }
    assert_eq!(stats().reallocation_failures, before.reallocation_failures + 1);

    // SAFETY: failing functions never hand out blocks.
    let status = unsafe {
        hpack_mem_init_with(Some(failing_malloc), Some(failing_realloc), Some(host_free))
    };
    assert_eq!(status, HPACK_MEM_OK);
    assert!(hpack_mem_malloc(64).is_null());
    assert!(hpack_mem_malloc_zero(64).is_null());
    assert_eq!(stats().allocation_failures, before.allocation_failures + 2);
    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn zeroed_entry_points_fill_whole_block_and_grown_tail() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    assert_eq!(install_host(), HPACK_MEM_OK);

    // SAFETY: blocks come from the active configuration and stay in bounds.
    unsafe {
        let p = hpack_mem_malloc_zero(10).cast::<u8>();
        assert!(!p.is_null());
        let zeroed = std::slice::from_raw_parts(p, 10);
        assert!(zeroed.iter().all(|&b| b == 0));

        for i in 0..10 {
            *p.add(i) = (i + 1) as u8;
        }
        let grown = hpack_mem_realloc_zero(p.cast(), 10, 20).cast::<u8>();
        assert!(!grown.is_null());
        let bytes = std::slice::from_raw_parts(grown, 20);
        assert_eq!(&bytes[..10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(bytes[10..].iter().all(|&b| b == 0));

        let shrunk = hpack_mem_realloc_zero(grown.cast(), 20, 5).cast::<u8>();
        assert_eq!(std::slice::from_raw_parts(shrunk, 5), &[1, 2, 3, 4, 5]);
        hpack_mem_free(shrunk.cast());
    }
    assert_eq!(HOST_MALLOCS.load(Ordering::SeqCst), 1);
    assert_eq!(HOST_REALLOCS.load(Ordering::SeqCst), 2);
    assert_eq!(HOST_FREES.load(Ordering::SeqCst), 1);

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn stats_expose_zero_fill_counters() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    assert_eq!(install_host(), HPACK_MEM_OK);
    let before = stats();

    let p = hpack_mem_malloc_zero(24);
    assert!(!p.is_null());
    // SAFETY: p came from hpack_mem_malloc_zero and is freed once.
    unsafe { hpack_mem_free(p) };

    let after = stats();
    assert_eq!(after.zero_fills, before.zero_fills + 1);
    assert_eq!(after.zeroed_bytes, before.zeroed_bytes + 24);
    assert_eq!(after.stale_buffer_leaks, before.stale_buffer_leaks);
    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn strerror_describes_lifecycle_codes() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    let status = hpack_mem_cleanup();
    assert_eq!(status, HPACK_MEM_ERR_NOT_INITIALIZED);
    // SAFETY: hpack_mem_strerror returns static NUL-terminated strings.
    let text = unsafe { CStr::from_ptr(hpack_mem_strerror(status)) };
    assert_eq!(text.to_str().unwrap(), "not initialized");
    // SAFETY: as above.
    let ok = unsafe { CStr::from_ptr(hpack_mem_strerror(HPACK_MEM_OK)) };
    assert_eq!(ok.to_str().unwrap(), "ok");
}

#[test]
fn realloc_null_routes_to_host_realloc() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    assert_eq!(install_host(), HPACK_MEM_OK);

    // SAFETY: null input behaves as malloc.
    unsafe {
        let p = hpack_mem_realloc(std::ptr::null_mut(), 48);
        assert!(!p.is_null());
        hpack_mem_free(p);
    }
    assert_eq!(HOST_REALLOCS.load(Ordering::SeqCst), 1);
    assert_eq!(HOST_MALLOCS.load(Ordering::SeqCst), 0);

    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);
}

#[test]
fn lifecycle_records_for_the_c_host_are_serializable() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset();
    global_registry().drain_lifecycle_logs();

    assert_eq!(install_host(), HPACK_MEM_OK);
    assert_eq!(hpack_mem_cleanup(), HPACK_MEM_OK);

    let logs = global_registry().drain_lifecycle_logs();
    if logs.is_empty() {
        // HPACKMEM_LIFECYCLE_LOG=off in the environment.
        return;
    }
    let init = logs
        .iter()
        .find(|r| r.symbol == "initialize_with")
        .expect("initialize_with record");
    assert_eq!(init.allocator, "c-host");
    let json = serde_json::to_string(init).unwrap();
    assert!(json.contains("\"state\":\"initialized_custom\""));
}
