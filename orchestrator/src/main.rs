use std::sync::Arc;

use clap::Parser as _;
use dotenvy::dotenv;
use inversion_orchestrator::cli::{read_event_list, Cli, Commands, RunCmd, StatusCmd};
use inversion_orchestrator::config::{load_config_from_run_cmd, ConfigBuilder};
use inversion_orchestrator::core::config::Config;
use inversion_orchestrator::core::ledger::{FileJobLedger, JobLedger};
use inversion_orchestrator::utils::logging::init_logging;
use inversion_orchestrator::utils::signal_handler::wait_for_shutdown_signal;
use inversion_orchestrator::worker::driver::{assemble_batch, IterationDriver};
use inversion_orchestrator::{OrchestratorError, OrchestratorResult};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run { run_command } => {
            info!("Executing run command with args: {:?}", run_command);
            run_orchestrator(run_command).await
        }
        Commands::Status { status_command } => show_status(status_command).await,
    };

    if let Err(e) = result {
        error!(error = %e, error_chain = ?e, "Orchestrator stopped with an error");
        std::process::exit(1);
    }
}

async fn run_orchestrator(run_cmd: &RunCmd) -> OrchestratorResult<()> {
    let file_config = load_config_from_run_cmd(run_cmd)?;

    let events = read_event_list(&run_cmd.events)?;
    let control_group = match &run_cmd.control_group {
        Some(path) => read_event_list(path)?,
        None => Vec::new(),
    };
    let batch = assemble_batch(events, control_group, &file_config.project_params(), run_cmd.iteration_number)?;
    info!(
        iteration = %run_cmd.iteration,
        events = batch.events.len(),
        validation = batch.validation.len(),
        "Batch assembled"
    );

    let config = Arc::new(Config::from_file_config(&file_config, &run_cmd.iteration, &batch).await?);
    let driver = IterationDriver::new(config, batch);

    tokio::select! {
        report = driver.run(run_cmd.phase) => {
            let report = report?;
            info!(
                iteration = %run_cmd.iteration,
                misfit = ?report.misfit,
                validation_misfit = ?report.validation_misfit,
                "Iteration run finished"
            );
            Ok(())
        }
        signal = wait_for_shutdown_signal() => {
            let signal = signal.map_err(anyhow::Error::from)?;
            warn!(iteration = %run_cmd.iteration, "Run interrupted; submitted jobs keep running and the next run resumes them");
            Err(OrchestratorError::Interrupted(signal.to_string()))
        }
    }
}

async fn show_status(status_cmd: &StatusCmd) -> OrchestratorResult<()> {
    let file_config = ConfigBuilder::new().with_config_file(&status_cmd.config_file)?.build()?;
    let ledger = FileJobLedger::open(&file_config.manifest_dir(), &status_cmd.iteration).await?;
    let manifest = ledger.snapshot().await?;

    info!(
        iteration = %manifest.iteration,
        created_at = %manifest.created_at,
        events = manifest.events.len(),
        misfits = manifest.misfits.len(),
        "Iteration manifest"
    );
    for (stage, summary) in manifest.stage_summaries() {
        info!(
            stage = %stage,
            events = summary.events,
            submitted = summary.submitted,
            retrieved = summary.retrieved,
            outstanding = summary.outstanding,
            reposts = summary.reposts,
            "Stage progress"
        );
    }
    Ok(())
}
