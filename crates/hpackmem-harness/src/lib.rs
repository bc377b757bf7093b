//! Scenario harness for the hpackmem allocator registry.
//!
//! This crate provides:
//! - Scenarios: scripted lifecycle walks, zeroed-buffer churn and
//!   initializer races run against a registry
//! - Reports: per-scenario step outcomes plus the registry metrics and
//!   lifecycle records, as JSON

#![forbid(unsafe_code)]

pub mod error;
pub mod report;
pub mod scenario;

pub use error::HarnessError;
pub use report::{ScenarioReport, StepOutcome};
pub use scenario::{ChurnParams, ContendParams, run_churn, run_contend, run_lifecycle};
