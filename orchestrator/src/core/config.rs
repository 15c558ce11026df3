use std::sync::Arc;

use orchestrator_scheduler_client_interface::SchedulerClient;
use orchestrator_slurm_client::{SlurmSchedulerClient, SlurmValidatedArgs};

use crate::config::OrchestratorConfig;
use crate::core::ledger::{FileJobLedger, JobLedger};
use crate::types::batch::Batch;
use crate::types::params::{HpcParams, ProjectParams};
use crate::worker::hooks::{MisfitFileHook, RetrievalHook};
use crate::worker::idle::IdleBackoff;
use crate::OrchestratorResult;

/// Runtime configuration of one iteration run: the parameters plus the clients
/// every orchestrator round goes through.
pub struct Config {
    iteration: String,
    project: ProjectParams,
    hpc: HpcParams,
    scheduler: Arc<dyn SchedulerClient>,
    ledger: Arc<dyn JobLedger>,
    hook: Arc<dyn RetrievalHook>,
    backoff: IdleBackoff,
}

impl Config {
    pub fn new(
        iteration: impl Into<String>,
        project: ProjectParams,
        hpc: HpcParams,
        scheduler: Arc<dyn SchedulerClient>,
        ledger: Arc<dyn JobLedger>,
        hook: Arc<dyn RetrievalHook>,
        backoff: IdleBackoff,
    ) -> Self {
        Self { iteration: iteration.into(), project, hpc, scheduler, ledger, hook, backoff }
    }

    /// Builds the runtime config from the loaded file config, creating (or resuming)
    /// the iteration's manifest for the batch.
    pub async fn from_file_config(
        file_config: &OrchestratorConfig,
        iteration: &str,
        batch: &Batch,
    ) -> OrchestratorResult<Self> {
        let project = file_config.project_params();
        let hpc = file_config.hpc_params();
        let slurm_args: SlurmValidatedArgs = file_config.scheduler.slurm.clone().into();

        let scheduler: Arc<dyn SchedulerClient> = Arc::new(SlurmSchedulerClient::new_with_args(&slurm_args));
        let ledger: Arc<dyn JobLedger> =
            Arc::new(FileJobLedger::create_iteration(&project.manifest_dir, iteration, project.layout, batch).await?);
        let hook: Arc<dyn RetrievalHook> = Arc::new(MisfitFileHook::default());
        let backoff = IdleBackoff::new(hpc.sleep_interval);

        tracing::debug!(iteration = %iteration, "Runtime configuration initialized");
        Ok(Self::new(iteration, project, hpc, scheduler, ledger, hook, backoff))
    }

    /// Name of the iteration being driven
    pub fn iteration(&self) -> &str {
        &self.iteration
    }

    pub fn project(&self) -> &ProjectParams {
        &self.project
    }

    pub fn hpc(&self) -> &HpcParams {
        &self.hpc
    }

    pub fn scheduler(&self) -> &dyn SchedulerClient {
        self.scheduler.as_ref()
    }

    pub fn ledger(&self) -> &dyn JobLedger {
        self.ledger.as_ref()
    }

    pub fn hook(&self) -> &dyn RetrievalHook {
        self.hook.as_ref()
    }

    pub fn backoff(&self) -> &IdleBackoff {
        &self.backoff
    }
}
