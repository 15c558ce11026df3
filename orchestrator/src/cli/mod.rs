use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::types::event::EventId;
use crate::worker::driver::Phase;

#[derive(Parser, Debug)]
#[command(
    name = "orchestrator",
    about = "Inversion Orchestrator - drives seismic inversion iterations through an HPC batch scheduler",
    long_about = "Inversion Orchestrator dispatches the per-event job chain of an inversion iteration \
    (interpolation, forward and adjoint simulations, processing, smoothing) to a remote batch scheduler, \
    polls it, reposts failed jobs and records progress in a per-iteration manifest.",
    after_help = "Examples:\n  \
    orchestrator run --config inversion.yaml --iteration it0003 --events events.txt --iteration-number 3\n  \
    orchestrator status --config inversion.yaml --iteration it0003"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive one iteration until the requested phases are complete
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
    /// Summarize the job records of an iteration
    Status {
        #[command(flatten)]
        status_command: StatusCmd,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// Path to YAML configuration file
    #[arg(long = "config", value_name = "PATH", env = "ORCHESTRATOR_CONFIG")]
    pub config_file: PathBuf,

    /// Name of the iteration; also the name of its manifest
    #[arg(long, value_name = "NAME")]
    pub iteration: String,

    /// File listing the training events, one per line or as a JSON array
    #[arg(long, value_name = "PATH")]
    pub events: PathBuf,

    /// Position of the iteration in the inversion, used to schedule validation
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub iteration_number: u32,

    /// File listing the control group events
    #[arg(long, value_name = "PATH")]
    pub control_group: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Phase::Full)]
    pub phase: Phase,

    /// Override hpc.max_reposts
    #[arg(long, env = "ORCHESTRATOR_MAX_REPOSTS")]
    pub max_reposts: Option<u32>,

    /// Override hpc.sleep_time_in_seconds
    #[arg(long, env = "ORCHESTRATOR_SLEEP_TIME_IN_SECONDS")]
    pub sleep_time_in_seconds: Option<u64>,

    /// Override project.manifest_dir
    #[arg(long, value_name = "PATH", env = "ORCHESTRATOR_MANIFEST_DIR")]
    pub manifest_dir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCmd {
    /// Path to YAML configuration file
    #[arg(long = "config", value_name = "PATH", env = "ORCHESTRATOR_CONFIG")]
    pub config_file: PathBuf,

    #[arg(long, value_name = "NAME")]
    pub iteration: String,
}

/// Reads an event list: a JSON array of names, or one name per line (`#` starts a comment).
pub fn read_event_list(path: &Path) -> Result<Vec<EventId>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read event list: {}", path.display()))?;
    parse_event_list(&content).with_context(|| format!("Invalid event list: {}", path.display()))
}

fn parse_event_list(content: &str) -> Result<Vec<EventId>> {
    if content.trim_start().starts_with('[') {
        let events: Vec<EventId> = serde_json::from_str(content).context("Failed to parse JSON event list")?;
        return Ok(events);
    }
    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(EventId::from)
        .collect())
}
