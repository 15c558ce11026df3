use std::collections::BTreeMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use mockall::predicate::eq;
use orchestrator_scheduler_client_interface::{JobHandle, JobStatus, MockSchedulerClient, SchedulerClientError};

use crate::core::ledger::JobLedger;
use crate::error::job::JobError;
use crate::tests::common::{events, mono_mesh_layout, preload, TestConfigBuilder, TestConfigBuilderReturns};
use crate::types::batch::Batch;
use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::stage::{PipelineLayout, SmoothingMode, Stage, SubmissionMode};
use crate::worker::listener::{JobListener, StatusCounts};

fn batch() -> Batch {
    Batch::new(events(&["E1", "E2", "E3"]), vec![], vec![]).unwrap()
}

async fn setup(scheduler: MockSchedulerClient, max_reposts: u32) -> TestConfigBuilderReturns {
    TestConfigBuilder::new()
        .configure_scheduler(Arc::new(scheduler))
        .configure_max_reposts(max_reposts)
        .build(&batch())
        .await
}

fn expect_status(scheduler: &mut MockSchedulerClient, handle: &str, status: JobStatus) {
    scheduler.expect_status().with(eq(JobHandle::new(handle))).times(1).returning(move |_| Ok(status.clone()));
}

fn forward_listener(max_reposts: u32) -> JobListener {
    JobListener::new(Stage::Forward, events(&["E3", "E1", "E2"]), SubmissionMode::PerEvent, max_reposts)
}

#[tokio::test]
async fn test_round_sorts_jobs_by_status() {
    let mut scheduler = MockSchedulerClient::new();
    expect_status(&mut scheduler, "101", JobStatus::Finished);
    expect_status(&mut scheduler, "102", JobStatus::Failed);
    expect_status(&mut scheduler, "103", JobStatus::Pending);
    let services = setup(scheduler, 3).await;
    for (event, name) in [("E1", "101"), ("E2", "102"), ("E3", "103")] {
        preload(services.ledger.as_ref(), &event.into(), Stage::Forward, name, false).await;
    }

    let report = forward_listener(3).poll(&services.config).await.unwrap();

    assert_eq!(report.retrieved_now, events(&["E1"]));
    assert_eq!(report.to_repost, events(&["E2"]));
    assert_eq!(report.in_flight, events(&["E3"]));
    assert_eq!(report.counts, StatusCounts { finished: 1, failed: 1, pending: 1, ..Default::default() });
    assert_eq!(report.outstanding(), 3);

    assert_eq!(report.repost_counts, BTreeMap::from([(EventId::from("E2"), 1)]));

    // Polling only plans the repost; the record is left for the caller
    let record = services.ledger.get(&"E2".into(), Stage::Forward).await.unwrap();
    assert_eq!(record.repost_count, 0);
    assert!(record.submitted);
}

#[tokio::test]
async fn test_query_error_leaves_job_untouched() {
    let mut scheduler = MockSchedulerClient::new();
    scheduler.expect_status().with(eq(JobHandle::new("101"))).times(1).returning(|handle| {
        Err(SchedulerClientError::StatusQuery { handle: handle.clone(), reason: "sacct timed out".to_string() })
    });
    let services = setup(scheduler, 3).await;
    preload(services.ledger.as_ref(), &"E1".into(), Stage::Forward, "101", false).await;

    let report = forward_listener(3).poll(&services.config).await.unwrap();

    assert_eq!(report.counts.query_errors, 1);
    assert_eq!(report.counts.not_submitted, 2);
    assert_eq!(report.in_flight, events(&["E1"]));
    assert!(report.to_repost.is_empty());
    assert_eq!(services.ledger.get(&"E1".into(), Stage::Forward).await.unwrap().repost_count, 0);
}

#[tokio::test]
async fn test_unknown_status_counts_as_failure() {
    let mut scheduler = MockSchedulerClient::new();
    expect_status(&mut scheduler, "101", JobStatus::Unknown);
    let services = setup(scheduler, 3).await;
    preload(services.ledger.as_ref(), &"E1".into(), Stage::Forward, "101", false).await;

    let report = forward_listener(3).poll(&services.config).await.unwrap();

    assert_eq!(report.counts.unknown, 1);
    assert_eq!(report.to_repost, events(&["E1"]));
}

#[tokio::test]
async fn test_cancelled_and_unrecognized_jobs_are_not_reposted() {
    let mut scheduler = MockSchedulerClient::new();
    expect_status(&mut scheduler, "101", JobStatus::Cancelled);
    expect_status(&mut scheduler, "102", JobStatus::Unrecognized("SPECIAL_EXIT".to_string()));
    let services = setup(scheduler, 3).await;
    preload(services.ledger.as_ref(), &"E1".into(), Stage::Forward, "101", false).await;
    preload(services.ledger.as_ref(), &"E2".into(), Stage::Forward, "102", false).await;

    let report = forward_listener(3).poll(&services.config).await.unwrap();

    assert_eq!(report.cancelled, events(&["E1"]));
    assert_eq!(report.in_flight, events(&["E2"]));
    assert!(report.to_repost.is_empty());
    assert_eq!(report.counts.cancelled, 1);
    assert_eq!(report.counts.unrecognized, 1);
    for event in ["E1", "E2"] {
        assert_eq!(services.ledger.get(&event.into(), Stage::Forward).await.unwrap().repost_count, 0);
    }
}

#[tokio::test]
async fn test_exhausted_budget_fails_without_touching_counters() {
    let mut scheduler = MockSchedulerClient::new();
    expect_status(&mut scheduler, "101", JobStatus::Failed);
    expect_status(&mut scheduler, "102", JobStatus::Failed);
    let services = setup(scheduler, 1).await;
    preload(services.ledger.as_ref(), &"E1".into(), Stage::Forward, "101", false).await;
    preload(services.ledger.as_ref(), &"E2".into(), Stage::Forward, "102", false).await;
    services.ledger.update(&"E2".into(), Stage::Forward, LedgerUpdate::RepostCount(1)).await.unwrap();

    let result = forward_listener(1).poll(&services.config).await;

    assert_matches!(
        result,
        Err(JobError::RepostBudgetExhausted { event, stage: Stage::Forward, reposts: 1, max_reposts: 1 })
            if event == EventId::from("E2")
    );
    // E1 was still within budget but the round had no side effects
    assert_eq!(services.ledger.get(&"E1".into(), Stage::Forward).await.unwrap().repost_count, 0);
}

#[tokio::test]
async fn test_retrieved_jobs_are_not_polled_again() {
    // No expectations: any status query fails the test
    let services = setup(MockSchedulerClient::new(), 3).await;
    preload(services.ledger.as_ref(), &"E1".into(), Stage::Forward, "101", true).await;

    let mut listener = forward_listener(3);
    let report = listener.poll(&services.config).await.unwrap();

    assert_eq!(report.counts.already_retrieved, 1);
    assert_eq!(report.not_submitted, events(&["E2", "E3"]));
    assert!(listener.already_retrieved().contains(&EventId::from("E1")));

    let report = listener.poll(&services.config).await.unwrap();
    assert_eq!(report.counts.already_retrieved, 1);
}

fn mono_batch_layout() -> PipelineLayout {
    PipelineLayout { smoothing: SmoothingMode::MonoBatch, ..mono_mesh_layout() }
}

async fn setup_array(scheduler: MockSchedulerClient) -> TestConfigBuilderReturns {
    let services = TestConfigBuilder::new()
        .configure_layout(mono_batch_layout())
        .configure_scheduler(Arc::new(scheduler))
        .build(&batch())
        .await;
    for (index, event) in events(&["E1", "E2", "E3"]).iter().enumerate() {
        services
            .ledger
            .update(event, Stage::Smoothing, LedgerUpdate::submitted_in_array("900", index as u32))
            .await
            .unwrap();
    }
    services
}

fn smoothing_listener() -> JobListener {
    JobListener::new(Stage::Smoothing, events(&["E1", "E2", "E3"]), SubmissionMode::SharedArray, 3)
}

#[tokio::test]
async fn test_array_failure_is_isolated_per_sub_task() {
    let mut scheduler = MockSchedulerClient::new();
    scheduler
        .expect_array_status()
        .with(eq(JobHandle::new("900")))
        .times(1)
        .returning(|_| Ok(vec![JobStatus::Finished, JobStatus::Failed, JobStatus::Running]));
    let services = setup_array(scheduler).await;

    let report = smoothing_listener().poll(&services.config).await.unwrap();

    assert_eq!(report.retrieved_now, events(&["E1"]));
    assert_eq!(report.to_repost, events(&["E2"]));
    assert_eq!(report.in_flight, events(&["E3"]));
    assert_eq!(report.repost_counts, BTreeMap::from([(EventId::from("E2"), 1)]));
}

#[tokio::test]
async fn test_missing_array_task_counts_as_unknown() {
    let mut scheduler = MockSchedulerClient::new();
    scheduler.expect_array_status().times(1).returning(|_| Ok(vec![JobStatus::Running, JobStatus::Running]));
    let services = setup_array(scheduler).await;

    let report = smoothing_listener().poll(&services.config).await.unwrap();

    assert_eq!(report.in_flight, events(&["E1", "E2"]));
    assert_eq!(report.counts.unknown, 1);
    assert_eq!(report.to_repost, events(&["E3"]));
}

#[tokio::test]
async fn test_array_query_error_leaves_every_task_in_flight() {
    let mut scheduler = MockSchedulerClient::new();
    scheduler
        .expect_array_status()
        .times(1)
        .returning(|handle| Err(SchedulerClientError::InvalidResponse(format!("no accounting for {handle}"))));
    let services = setup_array(scheduler).await;

    let report = smoothing_listener().poll(&services.config).await.unwrap();

    assert_eq!(report.counts.query_errors, 3);
    assert_eq!(report.in_flight.len(), 3);
}
