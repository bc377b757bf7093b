//! Scripted scenarios run against an allocator registry.
//!
//! Every scenario expects the registry to start uninitialized and leaves it
//! uninitialized on success.

use std::sync::{Arc, Barrier};
use std::thread;

use hpackmem_core::{
    AllocatorRegistry, LifecycleError, RegistryBuffer, RegistryConfig, SystemAllocator,
};
use tracing::{debug, info, warn};

use crate::error::HarnessError;
use crate::report::{ScenarioReport, StepOutcome};

fn label(result: Result<(), LifecycleError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(LifecycleError::AlreadyInitialized) => "already_initialized",
        Err(LifecycleError::NotInitialized) => "not_initialized",
    }
}

fn require_uninitialized(
    scenario: &'static str,
    registry: &AllocatorRegistry,
) -> Result<(), HarnessError> {
    if registry.is_initialized() {
        return Err(HarnessError::invariant(
            scenario,
            format!(
                "registry must start uninitialized, found {}",
                registry.state().as_str()
            ),
        ));
    }
    Ok(())
}

/// Detaches whatever configuration `body` left behind when it fails, so an
/// aborted scenario does not strand an initialized registry.
fn cleanup_on_error<T>(
    scenario: &'static str,
    registry: &AllocatorRegistry,
    body: impl FnOnce() -> Result<T, HarnessError>,
) -> Result<T, HarnessError> {
    let result = body();
    if let Err(error) = &result {
        if registry.is_initialized() {
            warn!(scenario, %error, "scenario aborted, cleaning up registry");
            let _ = registry.cleanup();
        }
    }
    result
}

/// Walks every edge of the lifecycle state machine, including the rejected
/// ones, and checks a zeroed buffer under the custom configuration.
pub fn run_lifecycle(registry: &AllocatorRegistry) -> Result<ScenarioReport, HarnessError> {
    const NAME: &str = "lifecycle";
    require_uninitialized(NAME, registry)?;
    info!(scenario = NAME, "scenario start");

    let mut steps = Vec::new();
    let host = || Arc::new(SystemAllocator);

    steps.push(StepOutcome::check("cleanup_fresh", "not_initialized", label(registry.cleanup())));
    steps.push(StepOutcome::check("initialize_with", "ok", label(registry.initialize_with(host()))));
    steps.push(StepOutcome::check(
        "state_after_initialize_with",
        "initialized_custom",
        registry.state().as_str(),
    ));
    steps.push(StepOutcome::check(
        "initialize_with_twice",
        "already_initialized",
        label(registry.initialize_with(host())),
    ));
    steps.push(StepOutcome::check(
        "initialize_default_over_custom",
        "already_initialized",
        label(registry.initialize_default()),
    ));

    cleanup_on_error(NAME, registry, || {
        let mut buffer = RegistryBuffer::zeroed(registry, 32)?;
        steps.push(StepOutcome::check(
            "zeroed_buffer",
            "zero",
            if buffer.as_slice().iter().all(|&b| b == 0) { "zero" } else { "dirty" },
        ));
        buffer.as_mut_slice().fill(0xA5);
        buffer.resize_zeroed(64)?;
        let (head, tail) = buffer.as_slice().split_at(32);
        steps.push(StepOutcome::check(
            "grown_buffer",
            "prefix_kept_tail_zero",
            if head.iter().all(|&b| b == 0xA5) && tail.iter().all(|&b| b == 0) {
                "prefix_kept_tail_zero"
            } else {
                "corrupt"
            },
        ));
        Ok(())
    })?;

    steps.push(StepOutcome::check("cleanup_custom", "ok", label(registry.cleanup())));
    steps.push(StepOutcome::check("allocator_after_cleanup", "system", registry.active_allocator()));
    steps.push(StepOutcome::check("initialize_default", "ok", label(registry.initialize_default())));
    steps.push(StepOutcome::check(
        "initialize_with_over_default",
        "already_initialized",
        label(registry.initialize_with(host())),
    ));
    steps.push(StepOutcome::check("cleanup_default", "ok", label(registry.cleanup())));
    steps.push(StepOutcome::check("cleanup_twice", "not_initialized", label(registry.cleanup())));

    let report = ScenarioReport::collect(NAME, steps, registry);
    info!(scenario = NAME, passed = report.passed, "scenario done");
    Ok(report)
}

/// Parameters for [`run_churn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChurnParams {
    pub iterations: usize,
    pub max_len: usize,
    /// Install a host allocator instead of claiming the defaults.
    pub custom: bool,
}

impl Default for ChurnParams {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            max_len: 4096,
            custom: true,
        }
    }
}

/// Allocates, grows and shrinks zeroed buffers, verifying contents each
/// step, then checks that every block went back to the registry.
pub fn run_churn(
    registry: &AllocatorRegistry,
    params: ChurnParams,
) -> Result<ScenarioReport, HarnessError> {
    const NAME: &str = "churn";
    if params.max_len == 0 {
        return Err(HarnessError::InvalidParameter("max_len must be nonzero".into()));
    }
    require_uninitialized(NAME, registry)?;
    info!(
        scenario = NAME,
        iterations = params.iterations,
        max_len = params.max_len,
        custom = params.custom,
        "scenario start"
    );

    if params.custom {
        registry.initialize_with(Arc::new(SystemAllocator))?;
    } else {
        registry.initialize_default()?;
    }
    let before = registry.metrics();

    let corrupt = cleanup_on_error(NAME, registry, || churn_buffers(registry, params))?;

    let after = registry.metrics();
    let mut steps = Vec::new();
    steps.push(StepOutcome::check("corrupt_buffers", "0", corrupt.to_string()));
    steps.push(StepOutcome::check(
        "blocks_returned",
        (after.allocations - before.allocations).to_string(),
        (after.frees - before.frees + after.zero_size_allocations - before.zero_size_allocations)
            .to_string(),
    ));
    steps.push(StepOutcome::check(
        "stale_leaks",
        "0",
        (after.stale_buffer_leaks - before.stale_buffer_leaks).to_string(),
    ));
    steps.push(StepOutcome::check("cleanup", "ok", label(registry.cleanup())));

    let report = ScenarioReport::collect(NAME, steps, registry);
    info!(scenario = NAME, passed = report.passed, "scenario done");
    Ok(report)
}

/// One churn pass; returns how many buffers came back with unexpected bytes.
fn churn_buffers(registry: &AllocatorRegistry, params: ChurnParams) -> Result<usize, HarnessError> {
    const NAME: &str = "churn";
    let mut corrupt = 0usize;
    for i in 0..params.iterations {
        let len = 1 + (i * 37) % params.max_len;
        let mut buffer = RegistryBuffer::zeroed(registry, len)?;
        if buffer.as_slice().iter().any(|&b| b != 0) {
            corrupt += 1;
            warn!(scenario = NAME, iteration = i, len, "fresh buffer not zeroed");
        }
        let pattern = (i % 251) as u8 | 1;
        buffer.as_mut_slice().fill(pattern);

        buffer.resize_zeroed(len * 2)?;
        let (head, tail) = buffer.as_slice().split_at(len);
        if !head.iter().all(|&b| b == pattern) || !tail.iter().all(|&b| b == 0) {
            corrupt += 1;
            warn!(scenario = NAME, iteration = i, len, "grown buffer corrupt");
        }

        buffer.resize_zeroed((len / 2).max(1))?;
        if !buffer.as_slice().iter().all(|&b| b == pattern) {
            corrupt += 1;
            warn!(scenario = NAME, iteration = i, len, "shrunk buffer corrupt");
        }
        debug!(scenario = NAME, iteration = i, len, "iteration done");
    }
    Ok(corrupt)
}

/// Parameters for [`run_contend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContendParams {
    pub threads: usize,
    pub rounds: usize,
}

impl Default for ContendParams {
    fn default() -> Self {
        Self {
            threads: 8,
            rounds: 32,
        }
    }
}

/// Races initializers against a fresh registry each round and checks that
/// exactly one wins.
///
/// Even-numbered threads call `initialize_with`, odd-numbered threads call
/// `initialize_default`. The report carries the metrics of the last round.
pub fn run_contend(
    config: RegistryConfig,
    params: ContendParams,
) -> Result<ScenarioReport, HarnessError> {
    const NAME: &str = "contend";
    if params.threads < 2 {
        return Err(HarnessError::InvalidParameter("threads must be at least 2".into()));
    }
    if params.rounds == 0 {
        return Err(HarnessError::InvalidParameter("rounds must be nonzero".into()));
    }
    info!(scenario = NAME, threads = params.threads, rounds = params.rounds, "scenario start");

    let mut steps = Vec::with_capacity(params.rounds);
    let mut last = None;
    for round in 0..params.rounds {
        let registry = AllocatorRegistry::with_config(config);
        let barrier = Barrier::new(params.threads);
        let winners = thread::scope(|scope| {
            let handles: Vec<_> = (0..params.threads)
                .map(|t| {
                    let registry = &registry;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        let result = if t % 2 == 0 {
                            registry.initialize_with(Arc::new(SystemAllocator))
                        } else {
                            registry.initialize_default()
                        };
                        result.is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|won| *won)
                .count()
        });
        debug!(scenario = NAME, round, winners, state = registry.state().as_str(), "round done");
        steps.push(StepOutcome::check(format!("round_{round}_winners"), "1", winners.to_string()));
        last = Some(registry);
    }

    let last = last.ok_or_else(|| HarnessError::invariant(NAME, "no rounds ran"))?;
    let report = ScenarioReport::collect(NAME, steps, &last);
    info!(scenario = NAME, passed = report.passed, "scenario done");
    Ok(report)
}
