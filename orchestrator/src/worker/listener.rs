use std::collections::{BTreeMap, BTreeSet};

use orchestrator_scheduler_client_interface::{JobHandle, JobStatus};

use crate::core::config::Config;
use crate::error::job::JobError;
use crate::types::event::EventId;
use crate::types::jobs::record::JobRecord;
use crate::types::stage::{Stage, SubmissionMode};
use crate::utils::metrics::{stage_attributes, ORCHESTRATOR_METRICS};

/// Per-status tallies of one polling round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub finished: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
    pub unknown: usize,
    pub cancelled: usize,
    pub unrecognized: usize,
    pub not_submitted: usize,
    pub already_retrieved: usize,
    /// Jobs whose status could not be queried this round.
    pub query_errors: usize,
}

/// Outcome of one polling round for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub stage: Stage,
    /// Finished jobs; the caller fetches their outputs and marks them retrieved.
    pub retrieved_now: Vec<EventId>,
    /// Failed or lost jobs still within their repost budget.
    pub to_repost: Vec<EventId>,
    /// Repost counter each event of `to_repost` moves to once it is resubmitted.
    /// Nothing is written to the ledger by the listener itself.
    pub repost_counts: BTreeMap<EventId, u32>,
    /// Pending, running, or of undetermined status this round.
    pub in_flight: Vec<EventId>,
    pub not_submitted: Vec<EventId>,
    /// Cancelled jobs wait for an operator and are not resubmitted.
    pub cancelled: Vec<EventId>,
    pub counts: StatusCounts,
}

impl RoundReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            retrieved_now: Vec::new(),
            to_repost: Vec::new(),
            repost_counts: BTreeMap::new(),
            in_flight: Vec::new(),
            not_submitted: Vec::new(),
            cancelled: Vec::new(),
            counts: StatusCounts::default(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.retrieved_now.len() + self.to_repost.len() + self.in_flight.len() + self.cancelled.len()
    }
}

/// Reconciles the ledger's view of one stage's jobs with the scheduler's, one round at a time.
///
/// The only state kept between rounds is the set of events already retrieved for the stage;
/// those are never polled again.
pub struct JobListener {
    stage: Stage,
    events: Vec<EventId>,
    mode: SubmissionMode,
    max_reposts: u32,
    already_retrieved: BTreeSet<EventId>,
}

impl JobListener {
    pub fn new(stage: Stage, events: impl IntoIterator<Item = EventId>, mode: SubmissionMode, max_reposts: u32) -> Self {
        let events: BTreeSet<EventId> = events.into_iter().collect();
        Self { stage, events: events.into_iter().collect(), mode, max_reposts, already_retrieved: BTreeSet::new() }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn already_retrieved(&self) -> &BTreeSet<EventId> {
        &self.already_retrieved
    }

    /// Polls every outstanding job of the stage once.
    ///
    /// Fails with [`JobError::RepostBudgetExhausted`] as soon as a job that has used up its
    /// reposts is seen failing. Polling never mutates the ledger: repost counters are only
    /// planned here and persisted by the caller once every stage of the round has been polled.
    #[tracing::instrument(skip_all, fields(stage = %self.stage))]
    pub async fn poll(&mut self, config: &Config) -> Result<RoundReport, JobError> {
        let ledger = config.ledger();
        let mut report = RoundReport::new(self.stage);

        let mut outstanding: Vec<(EventId, JobRecord)> = Vec::new();
        for event in &self.events {
            if self.already_retrieved.contains(event) {
                report.counts.already_retrieved += 1;
                continue;
            }
            let record = ledger.get(event, self.stage).await?;
            if record.retrieved {
                self.already_retrieved.insert(event.clone());
                report.counts.already_retrieved += 1;
            } else if !record.submitted {
                report.counts.not_submitted += 1;
                report.not_submitted.push(event.clone());
            } else {
                outstanding.push((event.clone(), record));
            }
        }

        let statuses = self.query_statuses(config, &outstanding).await;

        for ((event, record), status) in outstanding.into_iter().zip(statuses) {
            let Some(status) = status else {
                report.counts.query_errors += 1;
                report.in_flight.push(event);
                continue;
            };
            match status {
                JobStatus::Pending => {
                    report.counts.pending += 1;
                    report.in_flight.push(event);
                }
                JobStatus::Running => {
                    report.counts.running += 1;
                    report.in_flight.push(event);
                }
                JobStatus::Finished => {
                    report.counts.finished += 1;
                    report.retrieved_now.push(event);
                }
                JobStatus::Failed | JobStatus::Unknown => {
                    if status == JobStatus::Failed {
                        report.counts.failed += 1;
                    } else {
                        report.counts.unknown += 1;
                    }
                    if record.repost_count >= self.max_reposts {
                        tracing::error!(
                            event = %event,
                            job = %record.name,
                            status = %status,
                            reposts = record.repost_count,
                            "Job failed with no reposts left"
                        );
                        return Err(JobError::RepostBudgetExhausted {
                            event,
                            stage: self.stage,
                            reposts: record.repost_count,
                            max_reposts: self.max_reposts,
                        });
                    }
                    tracing::warn!(event = %event, job = %record.name, status = %status, "Job will be reposted");
                    report.repost_counts.insert(event.clone(), record.repost_count + 1);
                    report.to_repost.push(event);
                }
                JobStatus::Cancelled => {
                    tracing::warn!(
                        event = %event,
                        job = %record.name,
                        "Job was cancelled and needs operator intervention"
                    );
                    report.counts.cancelled += 1;
                    report.cancelled.push(event);
                }
                JobStatus::Unrecognized(raw) => {
                    tracing::warn!(event = %event, job = %record.name, status = %raw, "Unrecognized job status");
                    report.counts.unrecognized += 1;
                    report.in_flight.push(event);
                }
            }
        }

        let attributes = stage_attributes(self.stage);
        ORCHESTRATOR_METRICS.polling_rounds.add(1, &attributes);
        ORCHESTRATOR_METRICS.outstanding_jobs.record(report.outstanding() as u64, &attributes);

        let counts = &report.counts;
        tracing::info!(
            finished = counts.finished,
            running = counts.running,
            pending = counts.pending,
            reposting = report.to_repost.len(),
            cancelled = counts.cancelled,
            not_submitted = counts.not_submitted,
            retrieved = counts.already_retrieved,
            "Polling round complete"
        );
        Ok(report)
    }

    /// Live status of each outstanding job, `None` where the scheduler could not be queried.
    async fn query_statuses(&self, config: &Config, outstanding: &[(EventId, JobRecord)]) -> Vec<Option<JobStatus>> {
        let scheduler = config.scheduler();
        match self.mode {
            SubmissionMode::PerEvent => {
                let mut statuses = Vec::with_capacity(outstanding.len());
                for (event, record) in outstanding {
                    let handle = record.task_handle();
                    match scheduler.status(&handle).await {
                        Ok(status) => statuses.push(Some(status)),
                        Err(err) => {
                            tracing::warn!(event = %event, job = %handle, error = %err, "Status query failed");
                            statuses.push(None);
                        }
                    }
                }
                statuses
            }
            SubmissionMode::SharedArray => {
                // Sub-tasks of the same array are answered by a single query.
                let mut arrays: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
                for (position, (_, record)) in outstanding.iter().enumerate() {
                    arrays.entry(record.name.as_str()).or_default().push(position);
                }

                let mut statuses = vec![None; outstanding.len()];
                for (name, positions) in arrays {
                    let handle = JobHandle::new(name);
                    match scheduler.array_status(&handle).await {
                        Ok(tasks) => {
                            for position in positions {
                                let status = outstanding[position]
                                    .1
                                    .array_index
                                    .and_then(|index| tasks.get(index as usize).cloned())
                                    .unwrap_or(JobStatus::Unknown);
                                statuses[position] = Some(status);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(job = %handle, error = %err, "Array status query failed");
                        }
                    }
                }
                statuses
            }
        }
    }
}
