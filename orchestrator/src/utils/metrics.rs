use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::{global, KeyValue};

use crate::types::stage::Stage;

pub static ORCHESTRATOR_METRICS: Lazy<OrchestratorMetrics> = Lazy::new(OrchestratorMetrics::register);

pub struct OrchestratorMetrics {
    pub jobs_submitted: Counter<u64>,
    pub jobs_retrieved: Counter<u64>,
    pub jobs_reposted: Counter<u64>,
    pub polling_rounds: Counter<u64>,
    pub outstanding_jobs: Gauge<u64>,
    pub round_duration: Histogram<f64>,
}

impl OrchestratorMetrics {
    pub fn register() -> Self {
        let meter: Meter = global::meter("crates.inversion_orchestrator.opentelemetry");

        let jobs_submitted = meter
            .u64_counter("jobs_submitted")
            .with_description("Jobs handed to the scheduler, reposts included")
            .with_unit("jobs")
            .build();

        let jobs_retrieved = meter
            .u64_counter("jobs_retrieved")
            .with_description("Jobs whose outputs were collected and marked retrieved")
            .with_unit("jobs")
            .build();

        let jobs_reposted = meter
            .u64_counter("jobs_reposted")
            .with_description("Failed or lost jobs scheduled for resubmission")
            .with_unit("jobs")
            .build();

        let polling_rounds = meter
            .u64_counter("polling_rounds")
            .with_description("Listener polling rounds")
            .with_unit("rounds")
            .build();

        let outstanding_jobs = meter
            .u64_gauge("outstanding_jobs")
            .with_description("Submitted jobs not yet retrieved, as of the last round")
            .with_unit("jobs")
            .build();

        let round_duration = meter
            .f64_histogram("round_duration")
            .with_description("Time spent polling and acting in one orchestrator round")
            .with_unit("s")
            .build();

        Self { jobs_submitted, jobs_retrieved, jobs_reposted, polling_rounds, outstanding_jobs, round_duration }
    }
}

/// Metric attributes identifying a stage.
pub fn stage_attributes(stage: Stage) -> [KeyValue; 1] {
    [KeyValue::new("stage", stage.to_string())]
}
