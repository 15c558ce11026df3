use std::path::PathBuf;

use crate::types::event::EventId;
use crate::types::stage::PipelineLayout;

#[derive(Debug, Clone)]
pub struct ProjectParams {
    /// Local directory job outputs are fetched into.
    pub local_root: PathBuf,
    /// Directory on the remote site jobs run in.
    pub remote_root: PathBuf,
    /// Directory holding one manifest per iteration.
    pub manifest_dir: PathBuf,
    pub layout: PipelineLayout,
    /// Dispatch each event's adjoint as soon as its forward processing is retrieved.
    pub speculative_adjoints: bool,
    /// Iterations between validation runs; zero disables validation.
    pub validation_interval: u32,
    pub validation_dataset: Vec<EventId>,
}
