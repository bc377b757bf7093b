//! CLI entrypoint for the hpackmem scenario harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hpackmem_core::{AllocatorRegistry, LifecycleLogMode, RegistryConfig};
use hpackmem_harness::{ChurnParams, ContendParams, HarnessError, ScenarioReport};
use tracing_subscriber::EnvFilter;

/// Scenario tooling for the hpackmem allocator registry.
#[derive(Debug, Parser)]
#[command(name = "hpackmem-harness")]
#[command(about = "Scenario harness for the hpackmem allocator registry")]
struct Cli {
    /// Lifecycle log mode for harness-owned registries (off, transitions, verbose).
    #[arg(long, global = true)]
    log_mode: Option<String>,
    /// Write the JSON report here instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk every lifecycle transition, accepted and rejected.
    Lifecycle {
        /// Run against the process-wide registry behind the C entry points.
        #[arg(long)]
        global: bool,
    },
    /// Allocate, grow and shrink zeroed buffers and verify their contents.
    Churn {
        #[arg(long, default_value_t = 1_000)]
        iterations: usize,
        #[arg(long, default_value_t = 4096)]
        max_len: usize,
        /// Claim the defaults instead of installing a host allocator.
        #[arg(long)]
        defaults: bool,
        /// Run against the process-wide registry behind the C entry points.
        #[arg(long)]
        global: bool,
    },
    /// Race initializers and check exactly one wins each round.
    Contend {
        #[arg(long, default_value_t = 8)]
        threads: usize,
        #[arg(long, default_value_t = 32)]
        rounds: usize,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hpackmem=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn select_registry(global: bool, local: &AllocatorRegistry) -> &AllocatorRegistry {
    if global {
        hpackmem_abi::global_registry()
    } else {
        local
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = RegistryConfig::new();
    if let Some(mode) = cli.log_mode.as_deref() {
        config = config.with_log_mode(LifecycleLogMode::from_str_loose(mode));
    }
    let local = AllocatorRegistry::with_config(config);

    let report: ScenarioReport = match cli.command {
        Command::Lifecycle { global } => {
            hpackmem_harness::run_lifecycle(select_registry(global, &local))?
        }
        Command::Churn {
            iterations,
            max_len,
            defaults,
            global,
        } => hpackmem_harness::run_churn(
            select_registry(global, &local),
            ChurnParams {
                iterations,
                max_len,
                custom: !defaults,
            },
        )?,
        Command::Contend { threads, rounds } => {
            hpackmem_harness::run_contend(config, ContendParams { threads, rounds })?
        }
    };

    let json = report.to_json();
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json).map_err(HarnessError::from)?;
            eprintln!("Wrote {} report to {}", report.scenario, path.display());
        }
        None => println!("{json}"),
    }

    if !report.passed {
        let failed: Vec<String> = report.failures().map(|s| s.step.clone()).collect();
        return Err(HarnessError::Invariant {
            scenario: report.scenario,
            detail: format!("failed steps: {}", failed.join(", ")),
        }
        .into());
    }
    Ok(())
}
