use std::collections::BTreeMap;

use orchestrator_scheduler_client_interface::JobStatus;

use crate::error::SlurmError;

/// Maps a Slurm job state (as printed by `sacct -o State`) to the scheduler-neutral status.
///
/// `sacct` decorates some states, e.g. `CANCELLED by 1000`, so only the first word is used.
pub fn parse_slurm_state(raw: &str) -> JobStatus {
    let state = raw.split_whitespace().next().unwrap_or_default().trim_end_matches('+');
    match state {
        "PENDING" | "REQUEUED" | "REQUEUE_HOLD" | "REQUEUE_FED" | "CONFIGURING" | "SUSPENDED" | "RESIZING" => {
            JobStatus::Pending
        }
        "RUNNING" | "COMPLETING" | "STAGE_OUT" | "SIGNALING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Finished,
        "FAILED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" | "BOOT_FAIL" | "DEADLINE" | "PREEMPTED" => {
            JobStatus::Failed
        }
        "CANCELLED" | "REVOKED" => JobStatus::Cancelled,
        "" => JobStatus::Unknown,
        other => JobStatus::Unrecognized(other.to_string()),
    }
}

/// Parses the state of a single (non-array) job from `sacct -n -P -X -o State`.
pub fn parse_single_state(output: &str) -> Result<JobStatus, SlurmError> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(parse_slurm_state)
        .ok_or_else(|| SlurmError::MissingAccounting("no state reported".to_string()))
}

/// Parses `sacct -n -P -X -o JobID,State` output of an array job into per-index statuses.
///
/// Pending sub-tasks are reported compressed (`4242_[2-5%2]`), so ranges are expanded.
/// Indices below the highest reported one that `sacct` did not list are still queued
/// and reported as pending.
pub fn parse_array_states(output: &str) -> Result<Vec<JobStatus>, SlurmError> {
    let mut by_index: BTreeMap<u32, JobStatus> = BTreeMap::new();

    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (job_id, state) =
            line.split_once('|').ok_or_else(|| SlurmError::UnexpectedOutput(format!("malformed line: {line}")))?;
        let Some((_, task_part)) = job_id.split_once('_') else {
            // The array's parent record carries no index.
            continue;
        };
        let status = parse_slurm_state(state);
        for index in parse_array_indices(task_part)? {
            by_index.insert(index, status.clone());
        }
    }

    let Some(&max_index) = by_index.keys().next_back() else {
        return Err(SlurmError::MissingAccounting("no array sub-tasks reported".to_string()));
    };

    Ok((0..=max_index).map(|index| by_index.remove(&index).unwrap_or(JobStatus::Pending)).collect())
}

/// Expands a sub-task specifier: `7`, `[2-4]`, `[1,3-5%2]`.
pub fn parse_array_indices(spec: &str) -> Result<Vec<u32>, SlurmError> {
    let inner = spec.trim().trim_start_matches('[').trim_end_matches(']');
    let inner = inner.split_once('%').map_or(inner, |(ranges, _throttle)| ranges);

    let mut indices = Vec::new();
    for part in inner.split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start)?;
                let end = parse_index(end)?;
                if end < start {
                    return Err(SlurmError::UnexpectedOutput(format!("descending array range: {part}")));
                }
                indices.extend(start..=end);
            }
            None => indices.push(parse_index(part)?),
        }
    }
    Ok(indices)
}

fn parse_index(raw: &str) -> Result<u32, SlurmError> {
    raw.trim().parse::<u32>().map_err(|_| SlurmError::UnexpectedOutput(format!("invalid array index: {raw}")))
}

/// Extracts the job id from `sbatch --parsable` output (`<id>` or `<id>;<cluster>`).
pub fn parse_sbatch_output(output: &str) -> Result<String, SlurmError> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();
    let id = line.split(';').next().unwrap_or_default().trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(SlurmError::UnexpectedOutput(format!("sbatch returned no job id: {output:?}")));
    }
    Ok(id.to_string())
}
