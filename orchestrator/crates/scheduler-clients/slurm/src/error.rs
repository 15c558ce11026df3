use std::path::PathBuf;

use orchestrator_scheduler_client_interface::SchedulerClientError;

#[derive(Debug, thiserror::Error)]
pub enum SlurmError {
    /// The Slurm binary could not be spawned at all
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Slurm binary ran but exited unsuccessfully
    #[error("{program} exited with {code:?}: {stderr}")]
    CommandFailed { program: PathBuf, code: Option<i32>, stderr: String },

    #[error("Unexpected Slurm output: {0}")]
    UnexpectedOutput(String),

    /// Accounting has no record (yet) for the requested job
    #[error("No accounting record: {0}")]
    MissingAccounting(String),

    #[error("File error during {operation}: {source}")]
    File {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl SlurmError {
    pub fn file(operation: impl Into<String>, source: std::io::Error) -> Self {
        SlurmError::File { operation: operation.into(), source }
    }
}

impl From<SlurmError> for SchedulerClientError {
    fn from(value: SlurmError) -> Self {
        SchedulerClientError::Internal(Box::new(value))
    }
}
