pub mod client;
pub mod error;
pub mod script;
pub mod types;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use orchestrator_scheduler_client_interface::{JobHandle, JobSpec, JobStatus, SchedulerClient, SchedulerClientError};

use crate::client::{copy_dir_all, SlurmCli};
use crate::error::SlurmError;
use crate::script::{output_dir_for, render_script, SCRIPT_FILE_NAME};
use crate::types::{parse_array_states, parse_sbatch_output, parse_single_state};

#[derive(Debug, Clone)]
pub struct SlurmValidatedArgs {
    pub partition: Option<String>,
    pub account: Option<String>,
    pub sbatch_path: PathBuf,
    pub sacct_path: PathBuf,
    /// Extra `#SBATCH` directives, written verbatim (e.g. `--constraint=gpu`).
    pub extra_directives: Vec<String>,
}

/// Scheduler client for sites running Slurm.
///
/// Jobs are submitted by writing a batch script into the job's working directory and
/// handing it to `sbatch`. Status and output locations come from `sacct`, which keeps
/// records of finished jobs, unlike `squeue`.
pub struct SlurmSchedulerClient {
    cli: SlurmCli,
    partition: Option<String>,
    account: Option<String>,
    extra_directives: Vec<String>,
}

impl SlurmSchedulerClient {
    pub fn new_with_args(args: &SlurmValidatedArgs) -> Self {
        Self {
            cli: SlurmCli::new(args.sbatch_path.clone(), args.sacct_path.clone()),
            partition: args.partition.clone(),
            account: args.account.clone(),
            extra_directives: args.extra_directives.clone(),
        }
    }

    async fn work_dir(&self, handle: &JobHandle) -> Result<PathBuf, SlurmError> {
        let output = self.cli.sacct(handle.as_str(), "WorkDir").await?;
        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| SlurmError::MissingAccounting(format!("no working directory for job {handle}")))
    }
}

/// Splits `<job>_<index>` into the array index, if the handle names an array sub-task.
fn array_index_of(handle: &JobHandle) -> Option<u32> {
    handle.as_str().split_once('_').and_then(|(_, index)| index.parse().ok())
}

#[async_trait]
impl SchedulerClient for SlurmSchedulerClient {
    #[tracing::instrument(skip(self, spec), fields(job_name = %spec.name))]
    async fn submit(&self, spec: JobSpec) -> Result<JobHandle, SchedulerClientError> {
        let submission_error =
            |reason: String| SchedulerClientError::Submission { name: spec.name.clone(), reason };

        tokio::fs::create_dir_all(&spec.working_dir).await.map_err(|e| submission_error(e.to_string()))?;
        let script = render_script(&spec, self.partition.as_deref(), self.account.as_deref(), &self.extra_directives);
        let script_path = spec.working_dir.join(SCRIPT_FILE_NAME);
        tokio::fs::write(&script_path, script).await.map_err(|e| submission_error(e.to_string()))?;

        let stdout =
            self.cli.sbatch(&script_path, &spec.working_dir).await.map_err(|e| submission_error(e.to_string()))?;
        let job_id = parse_sbatch_output(&stdout).map_err(|e| submission_error(e.to_string()))?;

        tracing::info!(
            job_id = %job_id,
            array_size = ?spec.array_size,
            wall_time_secs = spec.wall_time.as_secs(),
            "Submitted job to Slurm"
        );
        Ok(JobHandle::new(job_id))
    }

    #[tracing::instrument(skip(self))]
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SchedulerClientError> {
        let output = self
            .cli
            .sacct(handle.as_str(), "State")
            .await
            .map_err(|e| SchedulerClientError::StatusQuery { handle: handle.clone(), reason: e.to_string() })?;
        let status = parse_single_state(&output)
            .map_err(|e| SchedulerClientError::StatusQuery { handle: handle.clone(), reason: e.to_string() })?;
        tracing::debug!(status = %status, "Fetched Slurm job state");
        Ok(status)
    }

    #[tracing::instrument(skip(self))]
    async fn array_status(&self, handle: &JobHandle) -> Result<Vec<JobStatus>, SchedulerClientError> {
        let output = self
            .cli
            .sacct(handle.as_str(), "JobID,State")
            .await
            .map_err(|e| SchedulerClientError::StatusQuery { handle: handle.clone(), reason: e.to_string() })?;
        let statuses = parse_array_states(&output)
            .map_err(|e| SchedulerClientError::StatusQuery { handle: handle.clone(), reason: e.to_string() })?;
        tracing::debug!(tasks = statuses.len(), "Fetched Slurm array states");
        Ok(statuses)
    }

    #[tracing::instrument(skip(self, destination), fields(destination = %destination.display()))]
    async fn fetch_outputs(&self, handle: &JobHandle, destination: &Path) -> Result<(), SchedulerClientError> {
        let fetch_error = |reason: String| SchedulerClientError::FetchOutputs { handle: handle.clone(), reason };

        let work_dir = self.work_dir(handle).await.map_err(|e| fetch_error(e.to_string()))?;
        let source = output_dir_for(&work_dir, array_index_of(handle));
        let copied = copy_dir_all(&source, destination).await.map_err(|e| fetch_error(e.to_string()))?;

        tracing::info!(source = %source.display(), files = copied, "Fetched job outputs");
        Ok(())
    }
}
