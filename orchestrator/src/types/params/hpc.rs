use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::stage::Stage;

/// Adjoint simulations run the wave solver backwards and store the forward wavefield,
/// so they get more wall time than the forward run.
pub const ADJOINT_WALL_TIME_FACTOR: f64 = 1.5;
pub const DEFAULT_PROCESSING_WALL_TIME: Duration = Duration::from_secs(3600);

/// How one stage's jobs are launched on the remote site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSettings {
    /// Shell command run by the job. `{iteration}`, `{event}` and `{events}` are substituted.
    pub command: String,
    pub wall_time: Option<Duration>,
    pub ranks: u32,
}

#[derive(Debug, Clone)]
pub struct HpcParams {
    /// Wait between polling rounds that retrieved nothing.
    pub sleep_interval: Duration,
    pub max_reposts: u32,
    /// Wall time of a forward simulation.
    pub wave_wall_time: Duration,
    pub stages: BTreeMap<Stage, StageSettings>,
}

impl HpcParams {
    pub fn settings(&self, stage: Stage) -> Option<&StageSettings> {
        self.stages.get(&stage)
    }

    /// Wall time requested for a stage's jobs.
    pub fn wall_time(&self, stage: Stage) -> Duration {
        if let Some(wall_time) = self.settings(stage).and_then(|settings| settings.wall_time) {
            return wall_time;
        }
        match stage {
            Stage::Forward => self.wave_wall_time,
            Stage::Adjoint => self.wave_wall_time.mul_f64(ADJOINT_WALL_TIME_FACTOR),
            _ => DEFAULT_PROCESSING_WALL_TIME,
        }
    }
}
