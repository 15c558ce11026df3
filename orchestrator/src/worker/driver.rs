use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::Config;
use crate::error::job::JobError;
use crate::types::batch::{is_validation_iteration, Batch};
use crate::types::chain::StageChain;
use crate::types::event::EventId;
use crate::types::params::ProjectParams;
use crate::worker::orchestrator::{RunSummary, StageOrchestrator};

/// Which macro-phases of an iteration to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Forward simulations and processing (plus validation when due).
    Forward,
    /// Adjoint simulations through smoothing.
    Adjoint,
    /// Both, forward first.
    #[default]
    Full,
}

/// What one driven iteration produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationReport {
    pub forward: Option<RunSummary>,
    pub validation: Option<RunSummary>,
    pub adjoint: Option<RunSummary>,
    /// Mean misfit over the training events, once every one of them has reported.
    pub misfit: Option<f64>,
    pub validation_misfit: Option<f64>,
}

/// Assembles the iteration's batch, adding the validation dataset when validation is due.
pub fn assemble_batch(
    events: Vec<EventId>,
    control_group: Vec<EventId>,
    project: &ProjectParams,
    iteration_number: u32,
) -> Result<Batch, JobError> {
    let validation = if is_validation_iteration(iteration_number, project.validation_interval) {
        project.validation_dataset.clone()
    } else {
        Vec::new()
    };
    Batch::new(events, control_group, validation)
}

/// Runs the macro-phases of one iteration over its batch.
pub struct IterationDriver {
    config: Arc<Config>,
    batch: Batch,
}

impl IterationDriver {
    pub fn new(config: Arc<Config>, batch: Batch) -> Self {
        Self { config, batch }
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub async fn run_forward(&self) -> Result<RunSummary, JobError> {
        let project = self.config.project();
        let chain = StageChain::forward_phase(project.layout, project.speculative_adjoints);
        StageOrchestrator::new(chain, self.batch.events.iter().cloned()).run(&self.config).await
    }

    pub async fn run_adjoint(&self) -> Result<RunSummary, JobError> {
        let chain = StageChain::adjoint_phase(self.config.project().layout);
        StageOrchestrator::new(chain, self.batch.events.iter().cloned()).run(&self.config).await
    }

    /// Drives the validation events to their misfit. `None` when the batch has none.
    pub async fn run_validation(&self) -> Result<Option<(RunSummary, f64)>, JobError> {
        if self.batch.validation.is_empty() {
            return Ok(None);
        }
        let chain = StageChain::validation(self.config.project().layout);
        let summary = StageOrchestrator::new(chain, self.batch.validation.iter().cloned()).run(&self.config).await?;
        let misfit = self.total_misfit(&self.batch.validation).await?;
        tracing::info!(validation_misfit = misfit, events = self.batch.validation.len(), "Validation complete");
        Ok(Some((summary, misfit)))
    }

    /// Mean of the recorded misfits of `events`.
    pub async fn total_misfit(&self, events: &[EventId]) -> Result<f64, JobError> {
        if events.is_empty() {
            return Err(JobError::EmptyMisfitSet);
        }
        let misfits = self.config.ledger().misfits().await?;
        let mut total = 0.0;
        for event in events {
            total += misfits.get(event).ok_or_else(|| JobError::MissingMisfit(event.clone()))?;
        }
        Ok(total / events.len() as f64)
    }

    #[tracing::instrument(skip(self), fields(iteration = %self.config.iteration()))]
    pub async fn run(&self, phase: Phase) -> Result<IterationReport, JobError> {
        let mut report = IterationReport::default();

        if matches!(phase, Phase::Forward | Phase::Full) {
            report.forward = Some(self.run_forward().await?);
            if let Some((summary, misfit)) = self.run_validation().await? {
                report.validation = Some(summary);
                report.validation_misfit = Some(misfit);
            }
        }
        if matches!(phase, Phase::Adjoint | Phase::Full) {
            report.adjoint = Some(self.run_adjoint().await?);
        }

        report.misfit = match self.total_misfit(&self.batch.events).await {
            Ok(misfit) => Some(misfit),
            Err(JobError::MissingMisfit(event)) => {
                tracing::debug!(event = %event, "Training misfit incomplete");
                None
            }
            Err(JobError::EmptyMisfitSet) => None,
            Err(err) => return Err(err),
        };
        tracing::info!(phase = %phase, misfit = ?report.misfit, "Iteration phase complete");
        Ok(report)
    }
}
