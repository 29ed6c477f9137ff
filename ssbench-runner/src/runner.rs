//! Run a scenario against a remote in three phases: priming, the timed run, and cleanup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures::StreamExt;
use ssbench_core::{Job, Operation, OperationResult, RunState};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::remote::{Payload, Remote};
use crate::scenario::Scenario;

/// Outcome counters of a single operation type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// Jobs that were executed successfully.
    pub completed: u64,
    /// Jobs that were executed but failed.
    pub failed: u64,
    /// Jobs that were not executed because no target object was available.
    pub skipped: u64,
}

/// Counters collected over a whole run.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Objects successfully created while priming.
    pub primed: u64,
    /// Creations that failed while priming.
    pub priming_failures: u64,
    /// Run phase counters per operation.
    pub operations: HashMap<Operation, OperationCounts>,
    /// Run objects deleted during cleanup.
    pub cleaned_up: u64,
    /// Cleanup deletes that failed.
    pub cleanup_failures: u64,
    /// Objects still tracked by the registry after the run.
    pub tracked_after_run: usize,
}

impl RunReport {
    /// Returns the run phase counters of `op`.
    pub fn counts(&self, op: Operation) -> OperationCounts {
        self.operations.get(&op).copied().unwrap_or_default()
    }

    /// Total number of jobs handled during the run phase, including skipped ones.
    pub fn total_operations(&self) -> u64 {
        self.operations
            .values()
            .map(|c| c.completed + c.failed + c.skipped)
            .sum()
    }

    fn record(&mut self, result: &OperationResult) {
        let counts = self.operations.entry(result.op).or_default();
        if result.is_failure() {
            counts.failed += 1;
        } else {
            counts.completed += 1;
        }
    }

    fn skip(&mut self, op: Operation) {
        self.operations.entry(op).or_default().skipped += 1;
    }
}

/// Runs the scenario against the remote with a fresh [`RunState`].
pub async fn run(remote: Arc<dyn Remote>, scenario: Scenario) -> Result<RunReport> {
    run_with_state(remote, scenario, Arc::new(RunState::new())).await
}

/// Runs the scenario against the remote, tracking objects in the given [`RunState`].
///
/// The store is primed with the scenario's initial files, then run jobs are dispatched
/// concurrently until the operation count or the run time is exhausted. Finally, if the scenario
/// asks for it, all objects created during the run are deleted again.
pub async fn run_with_state(
    remote: Arc<dyn Remote>,
    mut scenario: Scenario,
    run_state: Arc<RunState>,
) -> Result<RunReport> {
    if let Some(template) = scenario.post_template() {
        run_state
            .set_job_template(template.as_str())
            .context("failed to install post template")?;
    }
    let user_count = scenario.user_count();
    let permit_count =
        u32::try_from(user_count).context("user_count exceeds the number of semaphore permits")?;
    let report = Arc::new(Mutex::new(RunReport::default()));

    tracing::info!(scenario = scenario.name(), user_count, "priming store");
    let initial_jobs = scenario.initial_jobs();
    futures::stream::iter(initial_jobs)
        .for_each_concurrent(user_count, |job| {
            let remote = Arc::clone(&remote);
            let run_state = Arc::clone(&run_state);
            let report = Arc::clone(&report);
            async move {
                let result = execute(remote.as_ref(), &job).await;
                run_state.ingest_initialization_result(&result);

                let mut report = report.lock().unwrap();
                if result.is_failure() {
                    report.priming_failures += 1;
                } else {
                    report.primed += 1;
                }
            }
        })
        .await;

    tracing::info!(
        operation_count = scenario.operation_count(),
        run_time = ?scenario.run_time(),
        "starting run",
    );
    let semaphore = Arc::new(Semaphore::new(user_count));
    let deadline = scenario.run_time().map(|run_time| Instant::now() + run_time);

    for _ in 0..scenario.operation_count() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::info!("run time exhausted");
            break;
        }

        let permit = Arc::clone(&semaphore).acquire_owned().await?;

        let job = scenario.next_job();
        let op = job.op;
        let Some(job) = run_state.fill_in_job(job) else {
            tracing::debug!(%op, "no target available, skipping job");
            report.lock().unwrap().skip(op);
            continue;
        };

        let remote = Arc::clone(&remote);
        let run_state = Arc::clone(&run_state);
        let report = Arc::clone(&report);
        tokio::spawn(async move {
            let result = execute(remote.as_ref(), &job).await;
            run_state.ingest_run_result(&result);
            report.lock().unwrap().record(&result);
            drop(permit);
        });
    }

    // by acquiring *all* the permits, we wait for all outstanding jobs to finish
    let _permits = semaphore.acquire_many(permit_count).await?;

    if scenario.delete_after_run() {
        let targets = run_state.extract_cleanup_targets();
        tracing::info!(count = targets.len(), "deleting objects created during the run");

        futures::stream::iter(targets)
            .for_each_concurrent(user_count, |info| {
                let remote = Arc::clone(&remote);
                let report = Arc::clone(&report);
                async move {
                    let outcome = remote.delete(&info.container, &info.name).await;
                    let mut report = report.lock().unwrap();
                    match outcome {
                        Ok(()) => report.cleaned_up += 1,
                        Err(error) => {
                            tracing::warn!(
                                container = %info.container,
                                name = %info.name,
                                %error,
                                "failed to clean up object",
                            );
                            report.cleanup_failures += 1;
                        }
                    }
                }
            })
            .await;
    }

    let mut report = std::mem::take(&mut *report.lock().unwrap());
    report.tracked_after_run = run_state.snapshot().values().map(Vec::len).sum();
    tracing::info!(
        primed = report.primed,
        operations = report.total_operations(),
        cleaned_up = report.cleaned_up,
        "run finished",
    );

    Ok(report)
}

/// Executes a filled-in job and describes the outcome as a result record.
///
/// Remote errors never abort the run. They are reported through the result's failure marker.
pub async fn execute(remote: &dyn Remote, job: &Job) -> OperationResult {
    let container = job.container.as_deref().unwrap_or_default();
    let name = job.name.as_deref().unwrap_or_default();
    let payload = || Payload::new(rand::random(), job.size.unwrap_or_default());

    let outcome = match job.op {
        Operation::Create => remote.create(container, name, payload()).await.map(Some),
        Operation::Read => remote.read(container, name).await.map(Some),
        Operation::Update => remote.update(container, name, payload()).await.map(Some),
        Operation::Delete => remote.delete(container, name).await.map(|()| None),
        Operation::Post => {
            let contents = job.contents.as_deref().unwrap_or_default();
            remote.post(contents).await.map(|()| None)
        }
    };

    let size_class = job.size_class.as_deref().unwrap_or_default();
    let result = OperationResult::success(job.op, size_class, container, name);
    match outcome {
        Ok(Some(size)) => result.with_size(size),
        Ok(None) => result,
        Err(error) => {
            tracing::warn!(op = %job.op, container, name, %error, "operation failed");
            result.with_exception(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use ssbench_core::ObjectInfo;

    use super::*;
    use crate::remote::InMemoryRemote;
    use crate::scenario::{CrudProfile, SizeClass};

    #[tokio::test]
    async fn execute_reports_failures() {
        let remote = InMemoryRemote::new();

        let job = Job::new(Operation::Read)
            .with_size_class("tiny")
            .with_target("c", "missing");
        let result = execute(&remote, &job).await;
        assert!(result.is_failure());
        assert_eq!(result.name, "missing");

        let job = Job::new(Operation::Create)
            .with_size_class("tiny")
            .with_target("c", "o")
            .with_size(12);
        let result = execute(&remote, &job).await;
        assert_eq!(result.exception, None);
        assert_eq!(result.size, Some(12));
        assert_eq!(result.size_class, "tiny");
    }

    #[tokio::test]
    async fn keeps_objects_without_cleanup() {
        let remote = InMemoryRemote::new();
        let scenario = Scenario::builder("keep")
            .seed(3)
            .size_class(SizeClass::new("tiny", 1, 8))
            .initial_files("tiny", 2)
            .crud_profile(CrudProfile::new(1, 0, 0, 0, 0))
            .operation_count(5)
            .delete_after_run(false)
            .build()
            .unwrap();
        let run_state = Arc::new(RunState::new());

        let report = run_with_state(Arc::new(remote.clone()), scenario, Arc::clone(&run_state))
            .await
            .unwrap();

        assert_eq!(report.primed, 2);
        assert_eq!(report.counts(Operation::Create).completed, 5);
        assert_eq!(report.cleaned_up, 0);
        assert_eq!(report.tracked_after_run, 7);
        assert_eq!(remote.len(), 7);

        let run_objects: Vec<ObjectInfo> = run_state.extract_cleanup_targets();
        assert_eq!(run_objects.len(), 5);
    }
}
