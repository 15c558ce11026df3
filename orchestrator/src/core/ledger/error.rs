use std::path::PathBuf;

use thiserror::Error;

use crate::types::event::EventId;
use crate::types::stage::Stage;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// The stage does not apply to this event under the iteration's configuration
    #[error("No job record for event {event} at stage {stage}")]
    NotFound { event: EventId, stage: Stage },

    #[error("Job for event {event} at stage {stage} is already submitted as {name}")]
    AlreadySubmitted { event: EventId, stage: Stage, name: String },

    #[error("Invalid update of event {event} at stage {stage}: {reason}")]
    InvariantViolation { event: EventId, stage: Stage, reason: String },

    #[error("Manifest {path} does not match the requested iteration: {reason}")]
    ManifestMismatch { path: PathBuf, reason: String },

    #[error("Invalid iteration name {0:?}")]
    InvalidIterationName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Manifest writer task failed: {0}")]
    WriterTask(String),
}

impl LedgerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::Io { path: path.into(), source }
    }
}
