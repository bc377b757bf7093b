#![no_main]
use std::sync::Arc;

use hpackmem_core::{
    AllocError, AllocatorRegistry, LifecycleLogMode, RegistryBuffer, RegistryConfig,
    SystemAllocator,
};
use libfuzzer_sys::fuzz_target;

const MAX_LEN: usize = 1 << 16;

// Each 4-byte chunk is one operation: opcode, index, then a u16 length.
fuzz_target!(|data: &[u8]| {
    let registry =
        AllocatorRegistry::with_config(RegistryConfig::new().with_log_mode(LifecycleLogMode::Off));
    let mut buffers: Vec<RegistryBuffer<'_>> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let op = chunk[0] % 6;
        let index = chunk[1] as usize;
        let len = (u16::from_le_bytes([chunk[2], chunk[3]]) as usize).min(MAX_LEN);

        match op {
            0 => {
                let buf = RegistryBuffer::zeroed(&registry, len).expect("system allocation");
                assert!(buf.as_slice().iter().all(|&b| b == 0));
                buffers.push(buf);
            }
            1 => {
                if buffers.is_empty() {
                    continue;
                }
                let slot = index % buffers.len();
                let buf = &mut buffers[slot];
                let old_len = buf.len();
                buf.as_mut_slice().fill(0xCD);
                match buf.resize_zeroed(len) {
                    Ok(()) => {
                        let keep = old_len.min(len);
                        let (head, tail) = buf.as_slice().split_at(keep);
                        assert!(head.iter().all(|&b| b == 0xCD));
                        assert!(tail.iter().all(|&b| b == 0));
                    }
                    Err(AllocError::Exhausted { .. }) => assert_eq!(buf.len(), old_len),
                    Err(AllocError::StaleConfiguration) => unreachable!("no live buffer outlives a reconfiguration"),
                }
            }
            2 => {
                if !buffers.is_empty() {
                    let slot = index % buffers.len();
                    drop(buffers.swap_remove(slot));
                }
            }
            // Lifecycle ops release every live buffer first.
            3 => {
                buffers.clear();
                let _ = registry.initialize_with(Arc::new(SystemAllocator));
            }
            4 => {
                buffers.clear();
                let _ = registry.initialize_default();
            }
            _ => {
                buffers.clear();
                let _ = registry.cleanup();
            }
        }
    }
    buffers.clear();

    let snap = registry.metrics();
    assert_eq!(snap.stale_buffer_leaks, 0);
    assert_eq!(snap.initializations - snap.cleanups, u64::from(registry.is_initialized()));
});
