use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Scheduler client provides an abstraction over the batch scheduler of a remote HPC site:
/// - Accept a job specification and hand back a scheduler-assigned handle
/// - Report the live status of a job, or of every sub-task of an array job
/// - Copy the outputs of a terminal job to a local destination
///
/// The orchestrator only ever issues non-blocking calls through this trait; all of the
/// actual parallelism lives on the remote site.
#[automock]
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn submit(&self, spec: JobSpec) -> Result<JobHandle, SchedulerClientError>;
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SchedulerClientError>;
    /// Status of every sub-task of an array job, itemized by array index.
    async fn array_status(&self, handle: &JobHandle) -> Result<Vec<JobStatus>, SchedulerClientError>;
    async fn fetch_outputs(&self, handle: &JobHandle, destination: &Path) -> Result<(), SchedulerClientError>;
}

/// Scheduler-assigned identifier of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Handle of one sub-task of an array job, using the `<job>_<index>` convention.
    pub fn array_task(&self, index: u32) -> JobHandle {
        JobHandle(format!("{}_{}", self.0, index))
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Live status of a job as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Unknown,
    Cancelled,
    /// Any value this crate does not know about. Kept verbatim so callers can log it.
    Unrecognized(String),
}

impl FromStr for JobStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "finished" => JobStatus::Finished,
            "failed" => JobStatus::Failed,
            "unknown" => JobStatus::Unknown,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Unrecognized(s.trim().to_string()),
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Running => f.write_str("running"),
            JobStatus::Finished => f.write_str("finished"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Unknown => f.write_str("unknown"),
            JobStatus::Cancelled => f.write_str("cancelled"),
            JobStatus::Unrecognized(other) => f.write_str(other),
        }
    }
}

/// Everything the scheduler needs to run one job (or one array of jobs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,
    /// Shell command executed on the compute nodes.
    pub command: String,
    /// Remote directory the job runs in; outputs are written below it.
    pub working_dir: PathBuf,
    /// Remote input file references, exported to the job environment.
    pub inputs: Vec<PathBuf>,
    pub wall_time: Duration,
    pub ranks: u32,
    /// Number of sub-tasks when submitted as an array job.
    pub array_size: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerClientError {
    #[error("Failed to submit job {name}: {reason}")]
    Submission { name: String, reason: String },
    #[error("Failed to query status of job {handle}: {reason}")]
    StatusQuery { handle: JobHandle, reason: String },
    #[error("Failed to fetch outputs of job {handle}: {reason}")]
    FetchOutputs { handle: JobHandle, reason: String },
    #[error("Unexpected scheduler response: {0}")]
    InvalidResponse(String),
    #[error("Internal scheduler client error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
