pub mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use orchestrator_scheduler_client_interface::SchedulerClient;
use rstest::*;
use strum::IntoEnumIterator as _;
use tempfile::TempDir;

use crate::core::config::Config;
use crate::core::ledger::{FileJobLedger, JobLedger};
use crate::types::batch::Batch;
use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::params::{HpcParams, ProjectParams, StageSettings};
use crate::types::stage::{PipelineLayout, SmoothingMode, Stage};
use crate::worker::hooks::{NoopRetrievalHook, RetrievalHook};
use crate::worker::idle::IdleBackoff;
pub use scheduler::FakeScheduler;

pub const ITERATION: &str = "it0000";

#[fixture]
pub fn mono_mesh_layout() -> PipelineLayout {
    PipelineLayout { multi_mesh: false, remote_data_processing: true, smoothing: SmoothingMode::Individual }
}

#[fixture]
pub fn multi_mesh_layout() -> PipelineLayout {
    PipelineLayout { multi_mesh: true, remote_data_processing: false, smoothing: SmoothingMode::Individual }
}

pub fn events(names: &[&str]) -> Vec<EventId> {
    names.iter().map(|name| EventId::from(*name)).collect()
}

/// Settings for every stage; commands name their stage so specs are easy to tell apart.
pub fn hpc_params(max_reposts: u32) -> HpcParams {
    let stages = Stage::iter()
        .map(|stage| (stage, StageSettings { command: format!("run_{stage} {{event}}"), wall_time: None, ranks: 4 }))
        .collect::<BTreeMap<_, _>>();
    HpcParams {
        sleep_interval: Duration::from_millis(5),
        max_reposts,
        wave_wall_time: Duration::from_secs(3600),
        stages,
    }
}

pub struct TestConfigBuilder {
    layout: PipelineLayout,
    max_reposts: u32,
    hpc: Option<HpcParams>,
    speculative_adjoints: bool,
    validation_interval: u32,
    validation_dataset: Vec<EventId>,
    scheduler: Option<Arc<dyn SchedulerClient>>,
    hook: Option<Arc<dyn RetrievalHook>>,
}

pub struct TestConfigBuilderReturns {
    pub config: Arc<Config>,
    pub ledger: Arc<FileJobLedger>,
    /// Holds the manifest and the local project root; dropped with the test.
    pub workdir: TempDir,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            layout: mono_mesh_layout(),
            max_reposts: 3,
            hpc: None,
            speculative_adjoints: true,
            validation_interval: 0,
            validation_dataset: Vec::new(),
            scheduler: None,
            hook: None,
        }
    }

    pub fn configure_layout(mut self, layout: PipelineLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn configure_max_reposts(mut self, max_reposts: u32) -> Self {
        self.max_reposts = max_reposts;
        self
    }

    /// Replaces the default stage settings; `configure_max_reposts` is then ignored.
    pub fn configure_hpc(mut self, hpc: HpcParams) -> Self {
        self.hpc = Some(hpc);
        self
    }

    pub fn configure_speculative_adjoints(mut self, speculative_adjoints: bool) -> Self {
        self.speculative_adjoints = speculative_adjoints;
        self
    }

    pub fn configure_validation(mut self, interval: u32, dataset: Vec<EventId>) -> Self {
        self.validation_interval = interval;
        self.validation_dataset = dataset;
        self
    }

    pub fn configure_scheduler(mut self, scheduler: Arc<dyn SchedulerClient>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn configure_hook(mut self, hook: Arc<dyn RetrievalHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub async fn build(self, batch: &Batch) -> TestConfigBuilderReturns {
        let workdir = tempfile::tempdir().unwrap();
        let project = ProjectParams {
            local_root: workdir.path().join("project"),
            remote_root: "/scratch/inversion".into(),
            manifest_dir: workdir.path().join("manifests"),
            layout: self.layout,
            speculative_adjoints: self.speculative_adjoints,
            validation_interval: self.validation_interval,
            validation_dataset: self.validation_dataset,
        };
        let hpc = self.hpc.unwrap_or_else(|| hpc_params(self.max_reposts));

        let ledger =
            Arc::new(FileJobLedger::create_iteration(&project.manifest_dir, ITERATION, self.layout, batch).await.unwrap());
        let scheduler = self.scheduler.unwrap_or_else(|| Arc::new(FakeScheduler::new()) as Arc<dyn SchedulerClient>);
        let hook = self.hook.unwrap_or_else(|| Arc::new(NoopRetrievalHook) as Arc<dyn RetrievalHook>);
        let backoff = IdleBackoff::new(hpc.sleep_interval);

        let config = Arc::new(Config::new(
            ITERATION,
            project,
            hpc,
            scheduler,
            ledger.clone() as Arc<dyn JobLedger>,
            hook,
            backoff,
        ));
        TestConfigBuilderReturns { config, ledger, workdir }
    }
}

/// Marks a stage submitted under `name` and, optionally, retrieved.
pub async fn preload(ledger: &dyn JobLedger, event: &EventId, stage: Stage, name: &str, retrieved: bool) {
    ledger.update(event, stage, LedgerUpdate::submitted(name)).await.unwrap();
    if retrieved {
        ledger.update(event, stage, LedgerUpdate::Retrieved).await.unwrap();
    }
}
