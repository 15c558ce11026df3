use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid misfit file {path}: {reason}")]
    InvalidMisfit { path: PathBuf, reason: String },

    /// The stage yields a misfit but its outputs were not fetched
    #[error("No local outputs to read the misfit from")]
    MissingOutputs,
}
