use std::path::PathBuf;
use std::time::Duration;

use assert_matches::assert_matches;
use rstest::rstest;

use crate::error::job::JobError;
use crate::tests::common::{events, hpc_params, mono_mesh_layout, multi_mesh_layout, TestConfigBuilder};
use crate::types::batch::Batch;
use crate::types::event::EventId;
use crate::types::params::StageSettings;
use crate::types::stage::{PipelineLayout, SmoothingMode, Stage};
use crate::worker::dispatch::{build_job_spec, local_output_dir, DispatchTarget};

fn batch() -> Batch {
    Batch::new(events(&["E1", "E2"]), vec![], vec![]).unwrap()
}

#[tokio::test]
async fn test_forward_spec_for_one_event() {
    let services = TestConfigBuilder::new().build(&batch()).await;
    let event = EventId::from("E1");

    let spec = build_job_spec(&services.config, Stage::Forward, DispatchTarget::Event(&event)).unwrap();

    assert_eq!(spec.name, "forward_it0000_E1");
    assert_eq!(spec.command, "run_forward E1");
    assert_eq!(spec.working_dir, PathBuf::from("/scratch/inversion/it0000/forward/E1"));
    assert!(spec.inputs.is_empty());
    assert_eq!(spec.wall_time, Duration::from_secs(3600));
    assert_eq!(spec.ranks, 4);
    assert_eq!(spec.array_size, None);
}

#[rstest]
#[case(mono_mesh_layout(), Stage::HpcProcessing, "forward")]
#[case(multi_mesh_layout(), Stage::HpcProcessing, "data_processing")]
#[case(multi_mesh_layout(), Stage::Forward, "model_interpolation")]
#[tokio::test]
async fn test_inputs_come_from_the_upstream_stage(
    #[case] layout: PipelineLayout,
    #[case] stage: Stage,
    #[case] upstream_dir: &str,
) {
    let services = TestConfigBuilder::new().configure_layout(layout).build(&batch()).await;
    let event = EventId::from("E2");

    let spec = build_job_spec(&services.config, stage, DispatchTarget::Event(&event)).unwrap();

    let expected = PathBuf::from("/scratch/inversion/it0000").join(upstream_dir).join("E2/output");
    assert_eq!(spec.inputs, vec![expected]);
}

#[tokio::test]
async fn test_adjoint_gets_more_wall_time() {
    let services = TestConfigBuilder::new().build(&batch()).await;
    let event = EventId::from("E1");

    let spec = build_job_spec(&services.config, Stage::Adjoint, DispatchTarget::Event(&event)).unwrap();

    assert_eq!(spec.wall_time, Duration::from_secs(5400));
}

#[tokio::test]
async fn test_array_spec_covers_every_event() {
    let mut hpc = hpc_params(3);
    hpc.stages.insert(
        Stage::Smoothing,
        StageSettings {
            command: "smooth --iteration {iteration} --events {events}".to_string(),
            wall_time: Some(Duration::from_secs(600)),
            ranks: 16,
        },
    );
    let layout = PipelineLayout { smoothing: SmoothingMode::MonoBatch, ..mono_mesh_layout() };
    let services = TestConfigBuilder::new().configure_layout(layout).configure_hpc(hpc).build(&batch()).await;
    let array = events(&["E1", "E2"]);

    let spec = build_job_spec(&services.config, Stage::Smoothing, DispatchTarget::Array { events: &array, generation: 2 }).unwrap();

    assert_eq!(spec.name, "smoothing_it0000_array");
    assert_eq!(spec.command, "smooth --iteration it0000 --events E1 E2");
    assert_eq!(spec.working_dir, PathBuf::from("/scratch/inversion/it0000/smoothing/array_g2"));
    assert_eq!(spec.array_size, Some(2));
    assert_eq!(spec.wall_time, Duration::from_secs(600));
    assert_eq!(
        spec.inputs,
        vec![
            PathBuf::from("/scratch/inversion/it0000/adjoint/E1/output"),
            PathBuf::from("/scratch/inversion/it0000/adjoint/E2/output"),
        ]
    );
}

#[tokio::test]
async fn test_missing_stage_settings() {
    let mut hpc = hpc_params(3);
    hpc.stages.remove(&Stage::Smoothing);
    let services = TestConfigBuilder::new().configure_hpc(hpc).build(&batch()).await;
    let event = EventId::from("E1");

    assert_matches!(
        build_job_spec(&services.config, Stage::Smoothing, DispatchTarget::Event(&event)),
        Err(JobError::MissingStageSettings(Stage::Smoothing))
    );
}

#[tokio::test]
async fn test_local_output_dir() {
    let services = TestConfigBuilder::new().build(&batch()).await;

    let dir = local_output_dir(&services.config, Stage::HpcProcessing, &"E2".into());

    assert_eq!(dir, services.workdir.path().join("project/it0000/hpc_processing/E2"));
}
