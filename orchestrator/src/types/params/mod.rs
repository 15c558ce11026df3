pub mod hpc;
pub mod project;

pub use hpc::{HpcParams, StageSettings};
pub use project::ProjectParams;
