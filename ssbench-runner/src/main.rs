//! Benchmark driver for object storage services.
//!
//! Reads a YAML scenario, primes the store, runs the scenario's job mix and finally deletes all
//! objects created during the run. Jobs are executed against an in-memory store.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use argh::FromArgs;
use ssbench_core::Operation;
use ssbench_runner::config::ScenarioConfig;
use ssbench_runner::observability;
use ssbench_runner::remote::InMemoryRemote;
use ssbench_runner::{RunReport, run};
use yansi::Paint;

/// Object storage benchmark driver
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the yaml scenario file
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// override the number of run phase operations
    #[argh(option)]
    operation_count: Option<usize>,

    /// override the number of concurrent operations
    #[argh(option)]
    user_count: Option<usize>,

    /// seed the job stream for a reproducible run
    #[argh(option)]
    seed: Option<u64>,

    /// keep objects created during the run instead of deleting them
    #[argh(switch)]
    keep_objects: bool,

    /// log at debug level unless RUST_LOG is set
    #[argh(switch, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    observability::init_tracing(args.verbose);

    let mut config = ScenarioConfig::load(&args.config)?;
    if let Some(operation_count) = args.operation_count {
        config.operation_count = operation_count;
    }
    if let Some(user_count) = args.user_count {
        config.user_count = user_count;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.keep_objects {
        config.delete_after_run = false;
    }
    tracing::debug!(?config);

    let scenario = config.into_scenario().context("invalid scenario")?;
    let name = scenario.name().to_owned();
    let containers: Vec<_> = scenario.containers().collect();
    tracing::info!(
        count = containers.len(),
        first = ?containers.first(),
        last = ?containers.last(),
        "spreading objects over containers",
    );

    let remote = InMemoryRemote::new();
    let report = run(Arc::new(remote.clone()), scenario).await?;

    print_report(&name, &report);
    println!("{} objects left in the store", remote.len().bold());

    Ok(())
}

fn print_report(name: &str, report: &RunReport) {
    println!("{} {}", "## Scenario".bold(), name.bold().blue());
    print!("{} {} objects", "PRIMED:".bold().green(), report.primed.bold());
    if report.priming_failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", report.priming_failures).bold().red()
        );
    }
    println!();

    for op in Operation::ALL {
        let counts = report.counts(op);
        if counts == Default::default() {
            continue;
        }
        print!(
            "{} {} completed",
            format!("{op}:").bold().green(),
            counts.completed.bold()
        );
        if counts.skipped > 0 {
            print!(", {} skipped", counts.skipped.yellow());
        }
        if counts.failed > 0 {
            print!(", {}", format!("{} FAILURES", counts.failed).bold().red());
        }
        println!();
    }

    print!("{} {} objects", "CLEANUP:".bold().green(), report.cleaned_up.bold());
    if report.cleanup_failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", report.cleanup_failures).bold().red()
        );
    }
    println!();
}
