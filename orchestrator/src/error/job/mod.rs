pub mod hook;

use orchestrator_scheduler_client_interface::SchedulerClientError;
use thiserror::Error;

use crate::core::ledger::error::LedgerError;
use crate::types::event::EventId;
use crate::types::stage::Stage;
pub use hook::HookError;

pub type JobResult<T> = Result<T, JobError>;

/// Errors raised while driving jobs through a stage chain.
///
/// Transient scheduler conditions never surface here; everything below aborts the run.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),

    #[error("Scheduler client error: {0}")]
    SchedulerError(#[from] SchedulerClientError),

    #[error("Retrieval hook error: {0}")]
    HookError(#[from] HookError),

    /// A job kept failing after it had been reposted the maximum number of times
    #[error("Job for event {event} at stage {stage} failed after {reposts} reposts (max {max_reposts})")]
    RepostBudgetExhausted { event: EventId, stage: Stage, reposts: u32, max_reposts: u32 },

    /// A stage was about to be dispatched before the stage it depends on was retrieved
    #[error("Cannot dispatch {stage} for event {event}: {upstream} has not been retrieved")]
    DependencyNotReady { event: EventId, stage: Stage, upstream: Stage },

    #[error("No HPC settings configured for stage {0}")]
    MissingStageSettings(Stage),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("No misfit recorded for event {0}")]
    MissingMisfit(EventId),

    #[error("Cannot compute a misfit over an empty set of events")]
    EmptyMisfitSet,
}
