use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ledger::error::LedgerError;
use crate::types::batch::Batch;
use crate::types::chain::StageChain;
use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::jobs::record::JobRecord;
use crate::types::stage::{PipelineLayout, Stage};

/// Every job record of one iteration. This is the unit of crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationManifest {
    pub iteration: String,
    pub created_at: DateTime<Utc>,
    pub layout: PipelineLayout,
    pub events: BTreeMap<EventId, BTreeMap<Stage, JobRecord>>,
    #[serde(default)]
    pub misfits: BTreeMap<EventId, f64>,
    #[serde(default)]
    pub control_group: Vec<EventId>,
    #[serde(default)]
    pub validation: Vec<EventId>,
    /// Number of array jobs submitted so far per shared-array stage.
    #[serde(default)]
    pub array_generations: BTreeMap<Stage, u32>,
}

impl IterationManifest {
    /// Fresh records for a batch: training events get every stage of the layout,
    /// validation events only the validation chain.
    pub fn new(iteration: impl Into<String>, layout: PipelineLayout, batch: &Batch) -> Self {
        let fresh = |stages: &[Stage]| stages.iter().map(|stage| (*stage, JobRecord::default())).collect();

        let regular_stages = layout.stages();
        let validation_chain = StageChain::validation(layout);

        let mut events: BTreeMap<EventId, BTreeMap<Stage, JobRecord>> = BTreeMap::new();
        for event in &batch.events {
            events.insert(event.clone(), fresh(&regular_stages));
        }
        for event in &batch.validation {
            events.insert(event.clone(), fresh(validation_chain.stages()));
        }

        Self {
            iteration: iteration.into(),
            created_at: Utc::now().round_subsecs(0),
            layout,
            events,
            misfits: BTreeMap::new(),
            control_group: batch.control_group.clone(),
            validation: batch.validation.clone(),
            array_generations: BTreeMap::new(),
        }
    }

    /// Claims the next array generation of `stage`. Every array submission gets its own.
    pub fn next_array_generation(&mut self, stage: Stage) -> u32 {
        let generations = self.array_generations.entry(stage).or_insert(0);
        let claimed = *generations;
        *generations += 1;
        claimed
    }

    pub fn record(&self, event: &EventId, stage: Stage) -> Result<&JobRecord, LedgerError> {
        self.events
            .get(event)
            .and_then(|stages| stages.get(&stage))
            .ok_or_else(|| LedgerError::NotFound { event: event.clone(), stage })
    }

    /// Applies one update, enforcing the record invariants.
    pub fn apply(&mut self, event: &EventId, stage: Stage, update: &LedgerUpdate) -> Result<(), LedgerError> {
        let record = self
            .events
            .get_mut(event)
            .and_then(|stages| stages.get_mut(&stage))
            .ok_or_else(|| LedgerError::NotFound { event: event.clone(), stage })?;

        match update {
            LedgerUpdate::Submitted { name, array_index } => {
                if record.submitted {
                    return Err(LedgerError::AlreadySubmitted {
                        event: event.clone(),
                        stage,
                        name: record.name.clone(),
                    });
                }
                if name.is_empty() {
                    return Err(LedgerError::InvariantViolation {
                        event: event.clone(),
                        stage,
                        reason: "a submitted job needs a scheduler name".to_string(),
                    });
                }
                record.name = name.clone();
                record.array_index = *array_index;
                record.submitted = true;
            }
            LedgerUpdate::Unsubmitted => {
                if record.retrieved {
                    return Err(LedgerError::InvariantViolation {
                        event: event.clone(),
                        stage,
                        reason: "cannot unsubmit a retrieved job".to_string(),
                    });
                }
                record.name.clear();
                record.array_index = None;
                record.submitted = false;
            }
            LedgerUpdate::Retrieved => {
                if !record.submitted {
                    return Err(LedgerError::InvariantViolation {
                        event: event.clone(),
                        stage,
                        reason: "cannot retrieve a job that was never submitted".to_string(),
                    });
                }
                record.retrieved = true;
            }
            LedgerUpdate::RepostCount(count) => {
                record.repost_count = *count;
            }
        }
        Ok(())
    }

    /// Events among `events` whose job for `stage` is submitted but not retrieved.
    pub fn outstanding(&self, stage: Stage, events: &[EventId]) -> Vec<EventId> {
        events
            .iter()
            .filter(|event| self.record(event, stage).map(JobRecord::is_outstanding).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Per-stage progress over every event of the iteration.
    pub fn stage_summaries(&self) -> BTreeMap<Stage, StageSummary> {
        let mut summaries: BTreeMap<Stage, StageSummary> = BTreeMap::new();
        for record_by_stage in self.events.values() {
            for (stage, record) in record_by_stage {
                let summary = summaries.entry(*stage).or_default();
                summary.events += 1;
                summary.submitted += usize::from(record.submitted);
                summary.retrieved += usize::from(record.retrieved);
                summary.outstanding += usize::from(record.is_outstanding());
                summary.reposts += record.repost_count as usize;
            }
        }
        summaries
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub events: usize,
    pub submitted: usize,
    pub retrieved: usize,
    pub outstanding: usize,
    pub reposts: usize,
}
