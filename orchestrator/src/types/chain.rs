use serde::{Deserialize, Serialize};

use crate::types::stage::{PipelineLayout, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChainKind {
    Regular,
    /// The shorter chain run over the validation dataset; it ends at the misfit-yielding stage.
    Validation,
}

/// An ordered run of stages that one orchestrator drives to completion for a batch.
///
/// The optional handoff stage is dispatched (but not awaited) for every event that
/// completes the chain, so the next macro-phase starts without waiting on the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChain {
    stages: Vec<Stage>,
    handoff: Option<Stage>,
    kind: ChainKind,
    layout: PipelineLayout,
}

impl StageChain {
    /// Model interpolation (multi-mesh) through remote processing.
    ///
    /// With speculative adjoints the adjoint simulation of each event is dispatched as soon
    /// as that event's processing is retrieved.
    pub fn forward_phase(layout: PipelineLayout, speculative_adjoints: bool) -> Self {
        let stages = [Stage::ModelInterpolation, Stage::Forward, Stage::DataProcessing, Stage::HpcProcessing];
        Self::from_candidates(&stages, speculative_adjoints.then_some(Stage::Adjoint), ChainKind::Regular, layout)
    }

    /// Adjoint simulation through smoothing.
    pub fn adjoint_phase(layout: PipelineLayout) -> Self {
        let stages = [Stage::Adjoint, Stage::GradientInterpolation, Stage::Smoothing];
        Self::from_candidates(&stages, None, ChainKind::Regular, layout)
    }

    /// Every applicable stage, start to finish.
    pub fn full(layout: PipelineLayout) -> Self {
        Self { stages: layout.stages(), handoff: None, kind: ChainKind::Regular, layout }
    }

    /// Model interpolation (multi-mesh) and the forward simulation, which yields the misfit.
    pub fn validation(layout: PipelineLayout) -> Self {
        Self::from_candidates(&[Stage::ModelInterpolation, Stage::Forward], None, ChainKind::Validation, layout)
    }

    fn from_candidates(candidates: &[Stage], handoff: Option<Stage>, kind: ChainKind, layout: PipelineLayout) -> Self {
        let stages = candidates.iter().copied().filter(|stage| stage.is_applicable(&layout)).collect();
        Self { stages, handoff, kind, layout }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn handoff(&self) -> Option<Stage> {
        self.handoff
    }

    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    /// Completion of the last stage marks an event as done.
    pub fn final_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// The stage to dispatch once `stage` is retrieved for an event: the next chain stage,
    /// or the handoff after the final one.
    pub fn next_after(&self, stage: Stage) -> Option<Stage> {
        let position = self.stages.iter().position(|s| *s == stage)?;
        match self.stages.get(position + 1) {
            Some(next) => Some(*next),
            None => self.handoff,
        }
    }

    /// Stage whose retrieval yields the event's misfit, if it belongs to this chain.
    pub fn misfit_stage(&self) -> Option<Stage> {
        let stage = match self.kind {
            ChainKind::Regular => Stage::HpcProcessing,
            ChainKind::Validation => Stage::Forward,
        };
        self.contains(stage).then_some(stage)
    }
}
