use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::job::JobError;
use crate::types::event::EventId;

/// The events taking part in one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Batch {
    /// Training events; they run the full pipeline.
    pub events: Vec<EventId>,
    /// Subset of `events` used to test whether an optimization step is accepted.
    #[serde(default)]
    pub control_group: Vec<EventId>,
    /// Validation events; they only run the validation chain.
    #[serde(default)]
    pub validation: Vec<EventId>,
}

impl Batch {
    pub fn new(
        events: Vec<EventId>,
        control_group: Vec<EventId>,
        validation: Vec<EventId>,
    ) -> Result<Self, JobError> {
        let training: BTreeSet<&EventId> = events.iter().collect();
        if training.len() != events.len() {
            return Err(JobError::InvalidBatch("duplicate events in batch".to_string()));
        }
        if let Some(outsider) = control_group.iter().find(|event| !training.contains(event)) {
            return Err(JobError::InvalidBatch(format!("control group event {outsider} is not part of the batch")));
        }
        if let Some(overlap) = validation.iter().find(|event| training.contains(event)) {
            return Err(JobError::InvalidBatch(format!("validation event {overlap} is also a training event")));
        }
        Ok(Self { events, control_group, validation })
    }

    /// Every participant: training events followed by validation events.
    pub fn participants(&self) -> impl Iterator<Item = &EventId> {
        self.events.iter().chain(self.validation.iter())
    }
}

/// Whether validation runs in the given iteration.
///
/// An interval of zero disables validation. Otherwise the first iteration always
/// validates, and after that every `interval`-th one.
pub fn is_validation_iteration(iteration_number: u32, interval: u32) -> bool {
    if interval == 0 {
        return false;
    }
    iteration_number == 0 || (iteration_number + 1) % interval == 0
}
