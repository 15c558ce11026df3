pub mod job;

use orchestrator_scheduler_client_interface::SchedulerClientError;
use thiserror::Error;

use crate::core::ledger::error::LedgerError;
pub use job::{JobError, JobResult};

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Error types for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),

    #[error("Scheduler client error: {0}")]
    SchedulerError(#[from] SchedulerClientError),

    #[error("Orchestrator Error: {0}")]
    OrchestratorAnyHowError(#[from] anyhow::Error),

    /// The run was interrupted by a shutdown signal; the manifest holds the progress so far
    #[error("Interrupted by {0}")]
    Interrupted(String),
}
