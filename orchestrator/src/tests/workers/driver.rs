use std::sync::Arc;

use assert_matches::assert_matches;
use rstest::rstest;

use crate::core::ledger::JobLedger;
use crate::error::job::JobError;
use crate::tests::common::{events, FakeScheduler, TestConfigBuilder};
use crate::types::batch::Batch;
use crate::types::event::EventId;
use crate::types::params::ProjectParams;
use crate::types::stage::Stage;
use crate::worker::driver::{assemble_batch, IterationDriver, Phase};
use crate::worker::hooks::MisfitFileHook;

#[tokio::test]
async fn test_total_misfit_is_the_mean() {
    let batch = Batch::new(events(&["E1", "E2", "E3"]), vec![], vec![]).unwrap();
    let services = TestConfigBuilder::new().build(&batch).await;
    services.ledger.record_misfit(&"E1".into(), 1.0).await.unwrap();
    services.ledger.record_misfit(&"E2".into(), 3.0).await.unwrap();
    let driver = IterationDriver::new(services.config.clone(), batch);

    assert_eq!(driver.total_misfit(&events(&["E1", "E2"])).await.unwrap(), 2.0);
    assert_matches!(
        driver.total_misfit(&events(&["E1", "E3"])).await,
        Err(JobError::MissingMisfit(event)) if event == EventId::from("E3")
    );
    assert_matches!(driver.total_misfit(&[]).await, Err(JobError::EmptyMisfitSet));
}

#[tokio::test]
async fn test_full_iteration_with_validation() {
    let scheduler = Arc::new(FakeScheduler::new().with_misfit(0.5));
    let batch = Batch::new(events(&["E1", "E2"]), events(&["E1"]), events(&["V1"])).unwrap();
    let services = TestConfigBuilder::new()
        .configure_scheduler(scheduler.clone())
        .configure_hook(Arc::new(MisfitFileHook::default()))
        .build(&batch)
        .await;
    let driver = IterationDriver::new(services.config.clone(), batch);

    let report = driver.run(Phase::Full).await.unwrap();

    assert!(report.forward.is_some() && report.adjoint.is_some() && report.validation.is_some());
    assert_eq!(report.misfit, Some(0.5));
    assert_eq!(report.validation_misfit, Some(0.5));

    let names = scheduler.submitted_names();
    assert!(names.contains(&"forward_it0000_V1".to_string()));
    assert!(!names.iter().any(|name| name.ends_with("_V1") && !name.starts_with("forward")));
    for event in events(&["E1", "E2"]) {
        assert!(services.ledger.get(&event, Stage::Smoothing).await.unwrap().retrieved);
    }
    // Speculative adjoints were handed off by the forward phase, not submitted twice
    assert_eq!(names.iter().filter(|name| name.starts_with("adjoint_")).count(), 2);
}

#[tokio::test]
async fn test_forward_phase_only() {
    let scheduler = Arc::new(FakeScheduler::new().with_misfit(2.0));
    let batch = Batch::new(events(&["E1"]), vec![], vec![]).unwrap();
    let services = TestConfigBuilder::new()
        .configure_scheduler(scheduler.clone())
        .configure_hook(Arc::new(MisfitFileHook::default()))
        .configure_speculative_adjoints(false)
        .build(&batch)
        .await;
    let driver = IterationDriver::new(services.config.clone(), batch);

    let report = driver.run(Phase::Forward).await.unwrap();

    assert!(report.adjoint.is_none());
    assert!(report.validation.is_none());
    assert_eq!(report.misfit, Some(2.0));
    assert_eq!(scheduler.submitted_names(), vec!["forward_it0000_E1", "hpc_processing_it0000_E1"]);
}

#[tokio::test]
async fn test_adjoint_phase_before_forward_fails() {
    let batch = Batch::new(events(&["E1"]), vec![], vec![]).unwrap();
    let services = TestConfigBuilder::new().build(&batch).await;
    let driver = IterationDriver::new(services.config.clone(), batch);

    assert_matches!(driver.run(Phase::Adjoint).await, Err(JobError::DependencyNotReady { .. }));
}

fn project(validation_interval: u32) -> ProjectParams {
    ProjectParams {
        local_root: "/data".into(),
        remote_root: "/scratch".into(),
        manifest_dir: "/data/manifests".into(),
        layout: Default::default(),
        speculative_adjoints: false,
        validation_interval,
        validation_dataset: events(&["V1", "V2"]),
    }
}

#[rstest]
#[case(0, 0, false)]
#[case(0, 5, true)]
#[case(2, 5, false)]
#[case(3, 2, true)]
#[case(4, 2, false)]
fn test_assemble_batch_adds_validation_when_due(
    #[case] iteration_number: u32,
    #[case] interval: u32,
    #[case] validates: bool,
) {
    let interval_project = project(interval);
    let batch = assemble_batch(events(&["E1"]), vec![], &interval_project, iteration_number).unwrap();
    assert_eq!(!batch.validation.is_empty(), validates);
}
