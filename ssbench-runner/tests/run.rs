use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ssbench_core::{Operation, RunState};
use ssbench_runner::remote::{InMemoryRemote, Payload, Remote, RemoteError};
use ssbench_runner::runner::run_with_state;
use ssbench_runner::scenario::{CrudProfile, ScenarioBuilder, SizeClass};
use ssbench_runner::{Scenario, run};

/// Delays every creation so run phase jobs are still in flight when the loop ends.
#[derive(Debug)]
struct SlowCreates(InMemoryRemote);

#[async_trait]
impl Remote for SlowCreates {
    async fn create(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.0.create(container, name, payload).await
    }

    async fn read(&self, container: &str, name: &str) -> Result<u64, RemoteError> {
        self.0.read(container, name).await
    }

    async fn update(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError> {
        self.0.update(container, name, payload).await
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), RemoteError> {
        self.0.delete(container, name).await
    }

    async fn post(&self, contents: &str) -> Result<(), RemoteError> {
        self.0.post(contents).await
    }
}

fn scenario(name: &str) -> ScenarioBuilder {
    Scenario::builder(name)
        .seed(1234)
        .size_class(SizeClass::new("tiny", 16, 64))
        .size_class(SizeClass::new("small", 256, 1024).weight(2))
        .containers("bench", 4)
}

#[tokio::test]
async fn serial_run_never_targets_missing_objects() {
    ssbench_test::tracing::init();

    let remote = InMemoryRemote::new();
    let run_state = Arc::new(RunState::new());
    let scenario = scenario("serial")
        .initial_files("tiny", 5)
        .initial_files("small", 5)
        .crud_profile(CrudProfile::new(3, 3, 2, 2, 0))
        .operation_count(300)
        .user_count(1)
        .build()
        .unwrap();

    let report = run_with_state(Arc::new(remote.clone()), scenario, Arc::clone(&run_state))
        .await
        .unwrap();

    assert_eq!(report.primed, 10);
    assert_eq!(report.total_operations(), 300);
    for op in Operation::ALL {
        assert_eq!(report.counts(op).failed, 0, "{op} failed");
    }
    assert_eq!(report.cleanup_failures, 0);

    // Only primed objects survive, both in the store and in the registry.
    let tracked: Vec<_> = run_state.snapshot().into_values().flatten().collect();
    assert_eq!(tracked.len(), report.tracked_after_run);
    assert_eq!(remote.len(), tracked.len());
    for info in &tracked {
        assert!(info.initial);
        assert!(remote.contains(&info.container, &info.name));
    }
}

#[tokio::test]
async fn concurrent_run_without_deletes_cleans_up() {
    ssbench_test::tracing::init();

    let remote = InMemoryRemote::new();
    let scenario = scenario("concurrent")
        .initial_files("tiny", 20)
        .crud_profile(CrudProfile::new(2, 3, 1, 0, 0))
        .operation_count(1000)
        .user_count(16)
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    assert_eq!(report.primed, 20);
    let created = report.counts(Operation::Create).completed;
    assert!(created > 0);
    assert_eq!(report.cleaned_up, created);
    assert_eq!(report.counts(Operation::Read).failed, 0);
    assert_eq!(report.counts(Operation::Update).failed, 0);
    assert_eq!(remote.len(), 20);
}

#[tokio::test]
async fn failed_creations_are_not_tracked() {
    let remote = InMemoryRemote::new();
    remote.fail_next_creates(3);
    let run_state = Arc::new(RunState::new());
    let scenario = scenario("failures")
        .initial_files("tiny", 10)
        .crud_profile(CrudProfile::new(0, 1, 0, 0, 0))
        .operation_count(20)
        .user_count(1)
        .build()
        .unwrap();

    let report = run_with_state(Arc::new(remote.clone()), scenario, Arc::clone(&run_state))
        .await
        .unwrap();

    assert_eq!(report.primed, 7);
    assert_eq!(report.priming_failures, 3);
    assert_eq!(run_state.len("tiny"), 7);
    assert_eq!(remote.len(), 7);
    assert_eq!(report.counts(Operation::Read).failed, 0);
}

#[tokio::test]
async fn posts_render_the_template() {
    let remote = InMemoryRemote::new();
    let scenario = scenario("posts")
        .crud_profile(CrudProfile::new(0, 0, 0, 0, 1))
        .post_template("post-%d")
        .operation_count(5)
        .user_count(1)
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    assert_eq!(report.counts(Operation::Post).completed, 5);
    assert_eq!(
        remote.posted(),
        ["post-2", "post-3", "post-4", "post-5", "post-6"]
    );
    assert!(remote.is_empty());
}

#[tokio::test]
async fn posts_without_template_are_skipped() {
    let remote = InMemoryRemote::new();
    let scenario = scenario("no template")
        .initial_files("tiny", 2)
        .crud_profile(CrudProfile::new(0, 0, 0, 0, 1))
        .operation_count(5)
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    assert_eq!(report.counts(Operation::Post).skipped, 5);
    assert!(remote.posted().is_empty());
}

#[tokio::test]
async fn deletes_on_empty_store_are_skipped() {
    let remote = InMemoryRemote::new();
    let scenario = scenario("empty")
        .crud_profile(CrudProfile::new(0, 1, 1, 1, 0))
        .operation_count(50)
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    let skipped: u64 = Operation::ALL
        .iter()
        .map(|&op| report.counts(op).skipped)
        .sum();
    assert_eq!(skipped, 50);
    assert_eq!(report.tracked_after_run, 0);
}

#[tokio::test]
async fn deletes_drain_primed_objects() {
    let remote = InMemoryRemote::new();
    let scenario = scenario("drain")
        .initial_files("tiny", 3)
        .initial_files("small", 3)
        .crud_profile(CrudProfile::new(0, 0, 0, 1, 0))
        .operation_count(100)
        .user_count(1)
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    let deletes = report.counts(Operation::Delete);
    assert_eq!(deletes.completed, 6);
    assert_eq!(deletes.failed, 0);
    assert_eq!(deletes.skipped, 94);
    assert!(remote.is_empty());
}

#[tokio::test]
async fn run_time_bounds_the_run() {
    let remote = InMemoryRemote::new();
    let scenario = scenario("timed")
        .crud_profile(CrudProfile::new(1, 1, 0, 0, 0))
        .operation_count(usize::MAX)
        .run_time(Duration::from_millis(100))
        .build()
        .unwrap();

    let report = run(Arc::new(remote.clone()), scenario).await.unwrap();

    assert!(report.total_operations() > 0);
    assert!(remote.is_empty());
}

#[tokio::test]
async fn cleanup_waits_for_in_flight_creations() {
    let remote = InMemoryRemote::new();
    let run_state = Arc::new(RunState::new());
    let scenario = scenario("slow creates")
        .crud_profile(CrudProfile::new(1, 0, 0, 0, 0))
        .operation_count(5)
        .user_count(8)
        .build()
        .unwrap();

    let report = run_with_state(
        Arc::new(SlowCreates(remote.clone())),
        scenario,
        Arc::clone(&run_state),
    )
    .await
    .unwrap();

    assert_eq!(report.counts(Operation::Create).completed, 5);
    assert_eq!(report.cleaned_up, 5);
    assert_eq!(report.tracked_after_run, 0);
    assert!(remote.is_empty());
}
