//! Scenario reports.

use hpackmem_core::{AllocatorRegistry, LifecycleRecord, MetricsSnapshot};
use serde::Serialize;

/// One scripted step and whether it matched the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub expected: String,
    pub observed: String,
    pub passed: bool,
}

impl StepOutcome {
    pub fn check(
        step: impl Into<String>,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        let observed = observed.into();
        Self {
            step: step.into(),
            passed: expected == observed,
            expected,
            observed,
        }
    }
}

/// Result of running one scenario against a registry.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub passed: bool,
    pub steps: Vec<StepOutcome>,
    pub metrics: MetricsSnapshot,
    pub lifecycle: Vec<LifecycleRecord>,
}

impl ScenarioReport {
    /// Builds a report from `steps`, draining the registry's lifecycle log.
    pub fn collect(
        scenario: &'static str,
        steps: Vec<StepOutcome>,
        registry: &AllocatorRegistry,
    ) -> Self {
        Self {
            scenario,
            passed: steps.iter().all(|s| s.passed),
            steps,
            metrics: registry.metrics(),
            lifecycle: registry.drain_lifecycle_logs(),
        }
    }

    /// Steps that did not match their expectation.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.passed)
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
