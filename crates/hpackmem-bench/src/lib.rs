//! Benchmark-only crate for hpackmem. See `benches/`.
