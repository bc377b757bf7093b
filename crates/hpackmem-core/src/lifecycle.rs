//! Structured lifecycle records.
//!
//! Each registry keeps a bounded ring of records describing lifecycle
//! transitions, rejected transitions and (in verbose mode) allocation
//! failures. Every record is mirrored as a `tracing` event under the
//! `hpackmem::registry` target.

use std::collections::VecDeque;

use serde::Serialize;

use crate::registry::RegistryState;

/// Lifecycle record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured registry lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRecord {
    /// Monotonic decision/event id, unique per registry.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: LifecycleLevel,
    /// Registry operation (`initialize_with`, `cleanup`, `allocate`, ...).
    pub symbol: &'static str,
    /// Event kind (`transition`, `rejected_transition`, `alloc_failure`).
    pub event: &'static str,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Registry state after the operation.
    pub state: RegistryState,
    /// Label of the allocator active after the operation.
    pub allocator: &'static str,
    /// Free-form details for debugging.
    pub details: String,
}

impl LifecycleRecord {
    /// Builds an unnumbered record; the log assigns ids on push.
    #[must_use]
    pub fn new(
        level: LifecycleLevel,
        symbol: &'static str,
        event: &'static str,
        outcome: &'static str,
        state: RegistryState,
        allocator: &'static str,
    ) -> Self {
        Self {
            decision_id: 0,
            trace_id: String::new(),
            level,
            symbol,
            event,
            outcome,
            state,
            allocator,
            details: String::new(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Bounded ring of lifecycle records.
#[derive(Debug)]
pub(crate) struct LifecycleLog {
    records: VecDeque<LifecycleRecord>,
    capacity: usize,
    next_decision_id: u64,
}

impl LifecycleLog {
    pub(crate) const fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            next_decision_id: 1,
        }
    }

    /// Numbers `record`, emits it and retains it. Returns the decision id.
    pub(crate) fn push(&mut self, mut record: LifecycleRecord) -> u64 {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        record.decision_id = decision_id;
        record.trace_id = format!("hpackmem::registry::{}::{:016x}", record.symbol, decision_id);

        emit(&record);

        if self.capacity == 0 {
            return decision_id;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        decision_id
    }

    pub(crate) fn snapshot(&self) -> Vec<LifecycleRecord> {
        self.records.iter().cloned().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<LifecycleRecord> {
        self.records.drain(..).collect()
    }
}

fn emit(record: &LifecycleRecord) {
    macro_rules! emit_at {
        ($level:expr) => {
            tracing::event!(
                target: "hpackmem::registry",
                $level,
                decision_id = record.decision_id,
                trace_id = %record.trace_id,
                symbol = record.symbol,
                event = record.event,
                outcome = record.outcome,
                state = ?record.state,
                allocator = record.allocator,
                "{}",
                record.details
            )
        };
    }

    match record.level {
        LifecycleLevel::Trace => emit_at!(tracing::Level::TRACE),
        LifecycleLevel::Debug => emit_at!(tracing::Level::DEBUG),
        LifecycleLevel::Info => emit_at!(tracing::Level::INFO),
        LifecycleLevel::Warn => emit_at!(tracing::Level::WARN),
        LifecycleLevel::Error => emit_at!(tracing::Level::ERROR),
    }
}
