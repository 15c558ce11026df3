use std::path::PathBuf;

use orchestrator_slurm_client::SlurmValidatedArgs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub slurm: SlurmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlurmConfig {
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default = "default_sbatch")]
    pub sbatch_path: PathBuf,
    #[serde(default = "default_sacct")]
    pub sacct_path: PathBuf,
    /// Additional `#SBATCH` directives, e.g. `--constraint=gpu`
    #[serde(default)]
    pub extra_directives: Vec<String>,
}

fn default_sbatch() -> PathBuf {
    PathBuf::from("sbatch")
}

fn default_sacct() -> PathBuf {
    PathBuf::from("sacct")
}

impl From<SlurmConfig> for SlurmValidatedArgs {
    fn from(config: SlurmConfig) -> Self {
        Self {
            partition: config.partition,
            account: config.account,
            sbatch_path: config.sbatch_path,
            sacct_path: config.sacct_path,
            extra_directives: config.extra_directives,
        }
    }
}
