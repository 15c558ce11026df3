use std::path::PathBuf;

use itertools::Itertools;
use orchestrator_scheduler_client_interface::JobSpec;

use crate::core::config::Config;
use crate::error::job::JobError;
use crate::types::event::EventId;
use crate::types::stage::Stage;

/// Which events one submission covers.
#[derive(Debug, Clone, Copy)]
pub enum DispatchTarget<'a> {
    Event(&'a EventId),
    /// One array job, sub-task `i` serving `events[i]`.
    ///
    /// `generation` numbers the stage's array submissions and names the array's working
    /// directory, so concurrent arrays of the same stage never share one.
    Array { events: &'a [EventId], generation: u32 },
}

impl DispatchTarget<'_> {
    fn events(&self) -> &[EventId] {
        match self {
            DispatchTarget::Event(event) => std::slice::from_ref(*event),
            DispatchTarget::Array { events, .. } => events,
        }
    }
}

/// Remote directory of one stage within the iteration.
pub fn remote_stage_dir(config: &Config, stage: Stage) -> PathBuf {
    config.project().remote_root.join(config.iteration()).join(stage.to_string())
}

/// Local directory the outputs of an event's job for `stage` are fetched into.
pub fn local_output_dir(config: &Config, stage: Stage, event: &EventId) -> PathBuf {
    config.project().local_root.join(config.iteration()).join(stage.to_string()).join(event.as_str())
}

/// Builds the scheduler job specification for a stage.
pub fn build_job_spec(config: &Config, stage: Stage, target: DispatchTarget<'_>) -> Result<JobSpec, JobError> {
    let settings = config.hpc().settings(stage).ok_or(JobError::MissingStageSettings(stage))?;
    let iteration = config.iteration();
    let stage_dir = remote_stage_dir(config, stage);
    let events = target.events();
    let event_list = events.iter().map(EventId::as_str).join(" ");

    let (name, working_dir, array_size, command) = match target {
        DispatchTarget::Event(event) => (
            format!("{stage}_{iteration}_{event}"),
            stage_dir.join(event.as_str()),
            None,
            settings.command.replace("{event}", event.as_str()),
        ),
        DispatchTarget::Array { events, generation } => (
            format!("{stage}_{iteration}_array"),
            stage_dir.join(format!("array_g{generation}")),
            Some(events.len() as u32),
            settings.command.clone(),
        ),
    };
    let command = command.replace("{iteration}", iteration).replace("{events}", &event_list);

    let inputs = match stage.upstream(&config.project().layout) {
        Some(upstream) => {
            let upstream_dir = remote_stage_dir(config, upstream);
            events.iter().map(|event| upstream_dir.join(event.as_str()).join("output")).collect()
        }
        None => Vec::new(),
    };

    Ok(JobSpec {
        name,
        command,
        working_dir,
        inputs,
        wall_time: config.hpc().wall_time(stage),
        ranks: settings.ranks,
        array_size,
    })
}
