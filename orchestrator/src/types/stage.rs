use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// One step of the per-event pipeline.
///
/// Variants are declared in dependency order:
/// `model_interpolation → forward → data_processing → hpc_processing → adjoint →
/// gradient_interpolation → smoothing`. Which of them apply depends on the [`PipelineLayout`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    ModelInterpolation,
    Forward,
    DataProcessing,
    HpcProcessing,
    Adjoint,
    GradientInterpolation,
    Smoothing,
}

/// How the jobs of a stage are submitted to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// One scheduler job per event.
    PerEvent,
    /// One scheduler array job covering every event of the batch.
    SharedArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Each event's gradient is smoothed by its own job.
    #[default]
    Individual,
    /// All gradients of the batch are smoothed by one array job.
    MonoBatch,
}

/// Shape of the pipeline for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineLayout {
    /// Simulations run on per-event meshes; the model and gradients are interpolated in between.
    pub multi_mesh: bool,
    /// Data processing runs on the remote site as part of `hpc_processing`.
    pub remote_data_processing: bool,
    #[serde(default)]
    pub smoothing: SmoothingMode,
}

impl Default for PipelineLayout {
    fn default() -> Self {
        Self { multi_mesh: false, remote_data_processing: true, smoothing: SmoothingMode::Individual }
    }
}

impl PipelineLayout {
    /// Every stage that applies to a regular event, in dependency order.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::iter().filter(|stage| stage.is_applicable(self)).collect()
    }
}

impl Stage {
    pub fn is_applicable(&self, layout: &PipelineLayout) -> bool {
        match self {
            Stage::ModelInterpolation | Stage::GradientInterpolation => layout.multi_mesh,
            Stage::DataProcessing => !layout.remote_data_processing,
            Stage::Forward | Stage::HpcProcessing | Stage::Adjoint | Stage::Smoothing => true,
        }
    }

    /// The stage this one directly depends on under the given layout.
    pub fn upstream(&self, layout: &PipelineLayout) -> Option<Stage> {
        match self {
            Stage::ModelInterpolation => None,
            Stage::Forward => layout.multi_mesh.then_some(Stage::ModelInterpolation),
            Stage::DataProcessing => Some(Stage::Forward),
            Stage::HpcProcessing => {
                if Stage::DataProcessing.is_applicable(layout) {
                    Some(Stage::DataProcessing)
                } else {
                    Some(Stage::Forward)
                }
            }
            Stage::Adjoint => Some(Stage::HpcProcessing),
            Stage::GradientInterpolation => Some(Stage::Adjoint),
            Stage::Smoothing => {
                if layout.multi_mesh {
                    Some(Stage::GradientInterpolation)
                } else {
                    Some(Stage::Adjoint)
                }
            }
        }
    }

    pub fn submission_mode(&self, layout: &PipelineLayout) -> SubmissionMode {
        match (self, layout.smoothing) {
            (Stage::Smoothing, SmoothingMode::MonoBatch) => SubmissionMode::SharedArray,
            _ => SubmissionMode::PerEvent,
        }
    }

    /// Whether retrieving this stage copies its outputs back to the local project.
    ///
    /// The remaining stages only leave artifacts on the remote site for their successors.
    pub fn fetches_outputs(&self) -> bool {
        matches!(self, Stage::Forward | Stage::HpcProcessing | Stage::Smoothing)
    }
}
