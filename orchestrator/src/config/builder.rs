//! Configuration builder that implements the hierarchy: CLI > ENV > Config File > Defaults

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{load_config_file, OrchestratorConfig};
use crate::cli::RunCmd;

/// Configuration builder that merges config from multiple sources
#[derive(Default)]
pub struct ConfigBuilder {
    base_config: Option<OrchestratorConfig>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from a file path
    pub fn with_config_file(mut self, path: &Path) -> Result<Self> {
        info!("Loading configuration from file: {}", path.display());
        self.base_config = Some(load_config_file(path)?);
        Ok(self)
    }

    /// Start from an already parsed config
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.base_config = Some(config);
        self
    }

    /// Apply CLI overrides on top of the base config.
    /// Clap resolves CLI args over their ENV fallbacks, so both land here.
    pub fn with_cli_overrides(mut self, run_cmd: &RunCmd) -> Result<Self> {
        let config = self
            .base_config
            .as_mut()
            .context("Cannot apply CLI overrides without a base config (use with_config_file first)")?;
        debug!("Applying CLI overrides to configuration");

        if let Some(max_reposts) = run_cmd.max_reposts {
            debug!("Overriding hpc.max_reposts from CLI: {}", max_reposts);
            config.hpc.max_reposts = max_reposts;
        }
        if let Some(sleep_time) = run_cmd.sleep_time_in_seconds {
            debug!("Overriding hpc.sleep_time_in_seconds from CLI: {}", sleep_time);
            config.hpc.sleep_time_in_seconds = sleep_time;
        }
        if let Some(manifest_dir) = &run_cmd.manifest_dir {
            debug!("Overriding project.manifest_dir from CLI: {}", manifest_dir.display());
            config.project.manifest_dir = Some(manifest_dir.clone());
        }

        Ok(self)
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<OrchestratorConfig> {
        let config = self.base_config.context("No configuration loaded")?;

        info!("Validating configuration");
        config.validate()?;

        info!("Configuration loaded and validated successfully");
        Ok(config)
    }
}

/// Loads the file named by `--config` and applies the remaining CLI overrides.
pub fn load_config_from_run_cmd(run_cmd: &RunCmd) -> Result<OrchestratorConfig> {
    ConfigBuilder::new().with_config_file(&run_cmd.config_file)?.with_cli_overrides(run_cmd)?.build()
}
