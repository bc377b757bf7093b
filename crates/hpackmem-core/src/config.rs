//! Registry configuration.
//!
//! The lifecycle log mode is set via the `HPACKMEM_LIFECYCLE_LOG` environment
//! variable:
//! - `transitions` (default): record every lifecycle transition and every
//!   rejected transition.
//! - `verbose`: additionally record allocation failures.
//! - `off`: record nothing.
//!
//! A [`RegistryConfig`] may pin the mode for one registry, overriding the
//! environment.

use std::sync::atomic::{AtomicU8, Ordering};

/// Default number of lifecycle records retained per registry.
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// Which lifecycle events a registry records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleLogMode {
    /// Nothing is recorded.
    Off,
    /// Lifecycle transitions and rejected transitions.
    #[default]
    Transitions,
    /// Transitions plus allocation failures.
    Verbose,
}

impl LifecycleLogMode {
    /// Parse from string (case-insensitive). Unknown values fall back to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" | "0" => Self::Off,
            "verbose" | "all" | "full" | "trace" => Self::Verbose,
            _ => Self::Transitions,
        }
    }

    /// Returns true if lifecycle transitions are recorded.
    #[must_use]
    pub const fn records_transitions(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Returns true if allocation failures are recorded.
    #[must_use]
    pub const fn records_failures(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

// Atomic cache: 0=unresolved, 1=Off, 2=Transitions, 3=Verbose, 255=resolving.
// Resolution may run while an allocation path is active, so it must not
// block on a OnceLock held by the same thread.
static CACHED_MODE: AtomicU8 = AtomicU8::new(0);

const MODE_UNRESOLVED: u8 = 0;
const MODE_OFF: u8 = 1;
const MODE_TRANSITIONS: u8 = 2;
const MODE_VERBOSE: u8 = 3;
const MODE_RESOLVING: u8 = 255;

fn mode_to_u8(mode: LifecycleLogMode) -> u8 {
    match mode {
        LifecycleLogMode::Off => MODE_OFF,
        LifecycleLogMode::Transitions => MODE_TRANSITIONS,
        LifecycleLogMode::Verbose => MODE_VERBOSE,
    }
}

fn u8_to_mode(v: u8) -> LifecycleLogMode {
    match v {
        MODE_OFF => LifecycleLogMode::Off,
        MODE_VERBOSE => LifecycleLogMode::Verbose,
        _ => LifecycleLogMode::Transitions,
    }
}

/// Get the process-wide lifecycle log mode (reads the environment on first
/// call, caches thereafter).
///
/// A call that arrives while another call is resolving gets the default
/// mode instead of waiting.
#[must_use]
pub fn lifecycle_log_mode() -> LifecycleLogMode {
    let cached = CACHED_MODE.load(Ordering::Relaxed);

    if cached != MODE_UNRESOLVED && cached != MODE_RESOLVING {
        return u8_to_mode(cached);
    }

    if cached == MODE_RESOLVING {
        return LifecycleLogMode::default();
    }

    if CACHED_MODE
        .compare_exchange(
            MODE_UNRESOLVED,
            MODE_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_MODE.load(Ordering::Relaxed);
        return if v != MODE_UNRESOLVED && v != MODE_RESOLVING {
            u8_to_mode(v)
        } else {
            LifecycleLogMode::default()
        };
    }

    let mode = std::env::var("HPACKMEM_LIFECYCLE_LOG")
        .map(|v| LifecycleLogMode::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_MODE.store(mode_to_u8(mode), Ordering::Release);
    mode
}

/// Per-registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Pinned log mode; `None` follows `HPACKMEM_LIFECYCLE_LOG`.
    pub log_mode: Option<LifecycleLogMode>,
    /// Maximum retained lifecycle records. Oldest records are evicted first.
    pub log_capacity: usize,
}

impl RegistryConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            log_mode: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    #[must_use]
    pub const fn with_log_mode(mut self, mode: LifecycleLogMode) -> Self {
        self.log_mode = Some(mode);
        self
    }

    #[must_use]
    pub const fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Mode in effect for a registry built from this config.
    #[must_use]
    pub fn effective_log_mode(&self) -> LifecycleLogMode {
        match self.log_mode {
            Some(mode) => mode,
            None => lifecycle_log_mode(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}
