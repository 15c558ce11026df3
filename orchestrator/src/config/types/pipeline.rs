use serde::{Deserialize, Serialize};

use crate::types::stage::{PipelineLayout, SmoothingMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Simulate on per-event meshes and interpolate between them
    #[serde(default)]
    pub multi_mesh: bool,
    /// Process data on the remote site as part of the HPC processing job
    #[serde(default = "default_remote_data_processing")]
    pub remote_data_processing: bool,
    #[serde(default)]
    pub smoothing: SmoothingMode,
    /// Dispatch each event's adjoint as soon as its forward processing is retrieved
    #[serde(default)]
    pub speculative_adjoints: bool,
}

fn default_remote_data_processing() -> bool {
    true
}

impl PipelineConfig {
    pub fn layout(&self) -> PipelineLayout {
        PipelineLayout {
            multi_mesh: self.multi_mesh,
            remote_data_processing: self.remote_data_processing,
            smoothing: self.smoothing,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            multi_mesh: false,
            remote_data_processing: default_remote_data_processing(),
            smoothing: SmoothingMode::default(),
            speculative_adjoints: false,
        }
    }
}
