use std::collections::BTreeSet;

use tokio::time::Instant;

use crate::core::config::Config;
use crate::error::job::JobError;
use crate::types::chain::StageChain;
use crate::types::event::EventId;
use crate::types::jobs::job_updates::LedgerUpdate;
use crate::types::stage::{Stage, SubmissionMode};
use crate::utils::metrics::{stage_attributes, ORCHESTRATOR_METRICS};
use crate::worker::dispatch::{build_job_spec, local_output_dir, DispatchTarget};
use crate::worker::hooks::RetrievalContext;
use crate::worker::listener::{JobListener, RoundReport};

/// Totals of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: u64,
    pub submitted: usize,
    pub retrieved: usize,
    pub reposted: usize,
}

/// Drives a batch of events through a stage chain.
///
/// Events progress independently: as soon as one event's job for a stage is retrieved,
/// the next stage is dispatched for that event alone. The run ends once the chain's final
/// stage is retrieved for every event. All progress lives in the ledger, so a new
/// orchestrator over the same ledger resumes where a previous one stopped.
pub struct StageOrchestrator {
    chain: StageChain,
    events: Vec<EventId>,
}

impl StageOrchestrator {
    pub fn new(chain: StageChain, events: impl IntoIterator<Item = EventId>) -> Self {
        let events: BTreeSet<EventId> = events.into_iter().collect();
        Self { chain, events: events.into_iter().collect() }
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    #[tracing::instrument(skip_all, fields(iteration = %config.iteration(), chain = %self.chain.kind()))]
    pub async fn run(&self, config: &Config) -> Result<RunSummary, JobError> {
        let mut summary = RunSummary::default();
        let Some(final_stage) = self.chain.final_stage() else {
            return Ok(summary);
        };
        if self.events.is_empty() {
            return Ok(summary);
        }

        self.check_external_dependency(config).await?;

        let layout = *self.chain.layout();
        let max_reposts = config.hpc().max_reposts;
        let mut listeners: Vec<JobListener> = self
            .chain
            .stages()
            .iter()
            .map(|stage| {
                JobListener::new(*stage, self.events.iter().cloned(), stage.submission_mode(&layout), max_reposts)
            })
            .collect();

        tracing::info!(events = self.events.len(), stages = ?self.chain.stages(), "Starting stage chain");

        loop {
            summary.rounds += 1;
            let started = Instant::now();

            // Every stage is polled before anything is written or submitted, so a fatal
            // failure leaves the round without side effects on the ledger or the scheduler.
            let mut reports = Vec::with_capacity(listeners.len());
            for listener in listeners.iter_mut() {
                reports.push(listener.poll(config).await?);
            }

            let mut retrieved_this_round = 0;
            for report in &reports {
                let (retrieved, submitted) = self.collect(config, report).await?;
                retrieved_this_round += retrieved;
                summary.submitted += submitted;
                summary.reposted += report.to_repost.len();
                summary.submitted += self.repost(config, report).await?;
            }
            summary.retrieved += retrieved_this_round;
            summary.submitted += self.advance(config).await?;

            ORCHESTRATOR_METRICS
                .round_duration
                .record(started.elapsed().as_secs_f64(), &stage_attributes(final_stage));

            if self.is_complete(config, final_stage).await? {
                break;
            }
            if retrieved_this_round == 0 {
                tracing::debug!(interval_secs = config.backoff().interval().as_secs(), "Nothing retrieved, backing off");
                config.backoff().wait().await;
            }
        }

        summary.submitted += self.reconcile(config).await?;
        tracing::info!(
            rounds = summary.rounds,
            submitted = summary.submitted,
            retrieved = summary.retrieved,
            reposted = summary.reposted,
            "Stage chain complete"
        );
        Ok(summary)
    }

    /// The chain's first stage may depend on a stage driven by an earlier phase; that stage
    /// must already be retrieved for every event that still has to be dispatched.
    async fn check_external_dependency(&self, config: &Config) -> Result<(), JobError> {
        let Some(first) = self.chain.stages().first().copied() else {
            return Ok(());
        };
        let Some(upstream) = first.upstream(self.chain.layout()) else {
            return Ok(());
        };
        if self.chain.contains(upstream) {
            return Ok(());
        }

        let ledger = config.ledger();
        for event in &self.events {
            if ledger.get(event, first).await?.submitted {
                continue;
            }
            if !ledger.get(event, upstream).await?.retrieved {
                return Err(JobError::DependencyNotReady { event: event.clone(), stage: first, upstream });
            }
        }
        Ok(())
    }

    /// Fetches outputs of the round's finished jobs, runs the retrieval hook, marks them
    /// retrieved and dispatches each event's next stage. Returns (retrieved, submitted).
    async fn collect(&self, config: &Config, report: &RoundReport) -> Result<(usize, usize), JobError> {
        let stage = report.stage;
        let ledger = config.ledger();
        let mut retrieved = 0;
        let mut submitted = 0;

        for event in &report.retrieved_now {
            let record = ledger.get(event, stage).await?;

            let output_dir = if stage.fetches_outputs() {
                let destination = local_output_dir(config, stage, event);
                if let Err(err) = config.scheduler().fetch_outputs(&record.task_handle(), &destination).await {
                    // Not marked retrieved; the job is seen finished again next round.
                    tracing::warn!(event = %event, stage = %stage, error = %err, "Fetching outputs failed");
                    continue;
                }
                Some(destination)
            } else {
                None
            };

            let context = RetrievalContext {
                iteration: config.iteration().to_string(),
                event: event.clone(),
                stage,
                yields_misfit: self.chain.misfit_stage() == Some(stage),
                output_dir,
            };
            if let Some(misfit) = config.hook().after_retrieval(&context).await? {
                ledger.record_misfit(event, misfit).await?;
            }

            ledger.update(event, stage, LedgerUpdate::Retrieved).await?;
            ORCHESTRATOR_METRICS.jobs_retrieved.add(1, &stage_attributes(stage));
            tracing::info!(event = %event, stage = %stage, job = %record.name, "Job retrieved");
            retrieved += 1;

            if let Some(next) = self.chain.next_after(stage) {
                // Shared arrays wait for the whole batch, see `advance`.
                if next.submission_mode(self.chain.layout()) == SubmissionMode::PerEvent {
                    submitted += self.dispatch(config, next, std::slice::from_ref(event)).await?;
                }
            }
        }
        Ok((retrieved, submitted))
    }

    /// Bumps the repost counter of failed jobs, clears their submission and submits them again.
    async fn repost(&self, config: &Config, report: &RoundReport) -> Result<usize, JobError> {
        if report.to_repost.is_empty() {
            return Ok(0);
        }
        let ledger = config.ledger();
        for event in &report.to_repost {
            let count = match report.repost_counts.get(event) {
                Some(count) => *count,
                None => ledger.get(event, report.stage).await?.repost_count + 1,
            };
            ledger.update(event, report.stage, LedgerUpdate::RepostCount(count)).await?;
            ledger.update(event, report.stage, LedgerUpdate::Unsubmitted).await?;
            ORCHESTRATOR_METRICS.jobs_reposted.add(1, &stage_attributes(report.stage));
        }
        self.dispatch(config, report.stage, &report.to_repost).await
    }

    /// Dispatches every unsubmitted chain stage whose dependency is satisfied.
    ///
    /// This bootstraps the first stage and picks up events left behind by an interrupted run.
    async fn advance(&self, config: &Config) -> Result<usize, JobError> {
        let ledger = config.ledger();
        let layout = self.chain.layout();
        let mut submitted = 0;

        for stage in self.chain.stages().iter().copied() {
            let upstream = stage.upstream(layout);
            let mut pending = Vec::new();
            let mut all_cleared = true;

            for event in &self.events {
                let cleared = match upstream {
                    Some(upstream) => ledger.get(event, upstream).await?.retrieved,
                    None => true,
                };
                all_cleared &= cleared;
                if cleared && !ledger.get(event, stage).await?.submitted {
                    pending.push(event.clone());
                }
            }
            if pending.is_empty() {
                continue;
            }

            match stage.submission_mode(layout) {
                SubmissionMode::PerEvent => submitted += self.dispatch(config, stage, &pending).await?,
                SubmissionMode::SharedArray if all_cleared => {
                    submitted += self.dispatch(config, stage, &pending).await?
                }
                SubmissionMode::SharedArray => {
                    tracing::debug!(stage = %stage, ready = pending.len(), "Waiting for the batch before array dispatch");
                }
            }
        }
        Ok(submitted)
    }

    /// Dispatches the handoff stage for events that completed the chain without it.
    async fn reconcile(&self, config: &Config) -> Result<usize, JobError> {
        let (Some(handoff), Some(final_stage)) = (self.chain.handoff(), self.chain.final_stage()) else {
            return Ok(0);
        };
        let ledger = config.ledger();
        let mut missing = Vec::new();
        for event in &self.events {
            if ledger.get(event, final_stage).await?.retrieved && !ledger.get(event, handoff).await?.submitted {
                missing.push(event.clone());
            }
        }
        if missing.is_empty() {
            return Ok(0);
        }
        tracing::info!(stage = %handoff, events = missing.len(), "Dispatching missing handoff jobs");
        self.dispatch(config, handoff, &missing).await
    }

    async fn is_complete(&self, config: &Config, final_stage: Stage) -> Result<bool, JobError> {
        let ledger = config.ledger();
        for event in &self.events {
            if !ledger.get(event, final_stage).await?.retrieved {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Submits `stage` for the given events, skipping those already submitted.
    ///
    /// Shared-array stages are submitted as one array over the events still to run.
    /// Returns the number of events submitted.
    async fn dispatch(&self, config: &Config, stage: Stage, events: &[EventId]) -> Result<usize, JobError> {
        let ledger = config.ledger();
        let layout = self.chain.layout();

        let mut ready = Vec::with_capacity(events.len());
        for event in events {
            let record = ledger.get(event, stage).await?;
            if record.submitted {
                tracing::debug!(event = %event, stage = %stage, job = %record.name, "Already submitted, skipping");
                continue;
            }
            if let Some(upstream) = stage.upstream(layout) {
                if !ledger.get(event, upstream).await?.retrieved {
                    return Err(JobError::DependencyNotReady { event: event.clone(), stage, upstream });
                }
            }
            ready.push(event.clone());
        }
        if ready.is_empty() {
            return Ok(0);
        }

        let scheduler = config.scheduler();
        let attributes = stage_attributes(stage);
        match stage.submission_mode(layout) {
            SubmissionMode::PerEvent => {
                for event in &ready {
                    let spec = build_job_spec(config, stage, DispatchTarget::Event(event))?;
                    let handle = scheduler.submit(spec).await?;
                    ledger.update(event, stage, LedgerUpdate::submitted(handle.as_str())).await?;
                    ORCHESTRATOR_METRICS.jobs_submitted.add(1, &attributes);
                    tracing::info!(event = %event, stage = %stage, job = %handle, "Job submitted");
                }
            }
            SubmissionMode::SharedArray => {
                let generation = ledger.next_array_generation(stage).await?;
                let spec = build_job_spec(config, stage, DispatchTarget::Array { events: &ready, generation })?;
                let handle = scheduler.submit(spec).await?;
                for (index, event) in ready.iter().enumerate() {
                    ledger.update(event, stage, LedgerUpdate::submitted_in_array(handle.as_str(), index as u32)).await?;
                }
                ORCHESTRATOR_METRICS.jobs_submitted.add(ready.len() as u64, &attributes);
                tracing::info!(stage = %stage, job = %handle, generation, tasks = ready.len(), "Array job submitted");
            }
        }
        Ok(ready.len())
    }
}
