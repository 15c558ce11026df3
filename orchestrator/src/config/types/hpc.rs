use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::params::{HpcParams, StageSettings};
use crate::types::stage::Stage;

pub const DEFAULT_SLEEP_TIME_IN_SECONDS: u64 = 30;
pub const DEFAULT_MAX_REPOSTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HpcConfig {
    /// Seconds to wait between polling rounds that retrieved nothing
    #[serde(default = "default_sleep_time_in_seconds")]
    pub sleep_time_in_seconds: u64,

    /// Times a failed job is resubmitted before the run is aborted
    #[serde(default = "default_max_reposts")]
    pub max_reposts: u32,

    /// Wall time of a forward simulation; adjoint simulations get 1.5 times as much
    pub wave_wall_time_seconds: u64,

    pub stages: BTreeMap<Stage, StageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_time_seconds: Option<u64>,
    #[serde(default = "default_ranks")]
    pub ranks: u32,
}

fn default_sleep_time_in_seconds() -> u64 {
    DEFAULT_SLEEP_TIME_IN_SECONDS
}

fn default_max_reposts() -> u32 {
    DEFAULT_MAX_REPOSTS
}

fn default_ranks() -> u32 {
    1
}

impl From<&HpcConfig> for HpcParams {
    fn from(config: &HpcConfig) -> Self {
        let stages = config
            .stages
            .iter()
            .map(|(stage, settings)| {
                (
                    *stage,
                    StageSettings {
                        command: settings.command.clone(),
                        wall_time: settings.wall_time_seconds.map(Duration::from_secs),
                        ranks: settings.ranks,
                    },
                )
            })
            .collect();
        Self {
            sleep_interval: Duration::from_secs(config.sleep_time_in_seconds),
            max_reposts: config.max_reposts,
            wave_wall_time: Duration::from_secs(config.wave_wall_time_seconds),
            stages,
        }
    }
}
