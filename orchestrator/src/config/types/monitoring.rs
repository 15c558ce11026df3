use serde::{Deserialize, Serialize};

use crate::types::event::EventId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Run validation every this many iterations; 0 disables it
    #[serde(default)]
    pub iterations_between_validation_checks: u32,
    #[serde(default)]
    pub validation_dataset: Vec<EventId>,
}
