pub mod builder;
pub mod env_interpolation;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub use builder::{load_config_from_run_cmd, ConfigBuilder};
pub use types::*;

use crate::types::params::{HpcParams, ProjectParams};
use env_interpolation::interpolate_yaml_content;

/// Versioned configuration wrapper
/// Lets the file format evolve while older files keep loading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "config_version")]
pub enum OrchestratorConfigVersioned {
    #[serde(rename = "1")]
    V1(OrchestratorConfigV1),
}

impl OrchestratorConfigVersioned {
    /// Load configuration from a YAML file, interpolating `${VAR}` references
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let content = interpolate_yaml_content(&content)
            .with_context(|| format!("Failed to interpolate config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml_value: serde_yaml::Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        if yaml_value.get("config_version").is_none() {
            anyhow::bail!(
                "Missing required field 'config_version' in config file. \
                 Current supported version: 1"
            );
        }

        serde_yaml::from_str(content).context("Failed to deserialize config")
    }

    /// Convert to the canonical (latest) config format
    pub fn into_canonical(self) -> OrchestratorConfig {
        match self {
            OrchestratorConfigVersioned::V1(v1) => v1,
        }
    }
}

/// Canonical configuration (always latest version internally)
pub type OrchestratorConfig = OrchestratorConfigV1;

/// Version 1 of the orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfigV1 {
    pub project: ProjectConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub hpc: HpcConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub scheduler: SchedulerConfig,
}

/// Loads, interpolates and validates a configuration file.
pub fn load_config_file(path: &Path) -> Result<OrchestratorConfig> {
    let config = OrchestratorConfigVersioned::from_yaml_file(path)?.into_canonical();
    config.validate()?;
    Ok(config)
}

impl OrchestratorConfigV1 {
    pub fn project_params(&self) -> ProjectParams {
        ProjectParams {
            local_root: self.project.local_root.clone(),
            remote_root: self.project.remote_root.clone(),
            manifest_dir: self.project.manifest_dir(),
            layout: self.pipeline.layout(),
            speculative_adjoints: self.pipeline.speculative_adjoints,
            validation_interval: self.monitoring.iterations_between_validation_checks,
            validation_dataset: self.monitoring.validation_dataset.clone(),
        }
    }

    pub fn hpc_params(&self) -> HpcParams {
        HpcParams::from(&self.hpc)
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.project.manifest_dir()
    }

    /// Checks the settings the orchestrator cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.hpc.sleep_time_in_seconds == 0 {
            anyhow::bail!("hpc.sleep_time_in_seconds must be greater than zero");
        }
        if self.hpc.wave_wall_time_seconds == 0 {
            anyhow::bail!("hpc.wave_wall_time_seconds must be greater than zero");
        }

        let layout = self.pipeline.layout();
        let missing: Vec<String> = layout
            .stages()
            .into_iter()
            .filter(|stage| !self.hpc.stages.contains_key(stage))
            .map(|stage| stage.to_string())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing hpc.stages settings for: {}", missing.join(", "));
        }

        for (stage, settings) in &self.hpc.stages {
            if settings.command.trim().is_empty() {
                anyhow::bail!("hpc.stages.{stage}.command must not be empty");
            }
            if settings.ranks == 0 {
                anyhow::bail!("hpc.stages.{stage}.ranks must be at least 1");
            }
            if !stage.is_applicable(&layout) {
                tracing::warn!(stage = %stage, "Settings given for a stage the pipeline layout does not run");
            }
        }

        let duplicates = self.monitoring.validation_dataset.iter().map(|event| event.as_str()).duplicates().join(", ");
        if !duplicates.is_empty() {
            anyhow::bail!("Duplicate events in monitoring.validation_dataset: {duplicates}");
        }
        if self.monitoring.iterations_between_validation_checks > 0
            && self.monitoring.validation_dataset.is_empty()
        {
            anyhow::bail!("monitoring.validation_dataset is empty but validation checks are enabled");
        }
        Ok(())
    }
}
