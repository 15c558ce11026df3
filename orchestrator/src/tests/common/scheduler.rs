use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use orchestrator_scheduler_client_interface::{JobHandle, JobSpec, JobStatus, SchedulerClient, SchedulerClientError};

/// In-memory scheduler whose answers are scripted per job.
///
/// Statuses are scripted by job handle or by job name. Each query pops the next scripted
/// status; the last one sticks. Jobs without a script report `Finished`.
#[derive(Default)]
pub struct FakeScheduler {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    submissions: Vec<(JobHandle, JobSpec)>,
    statuses: HashMap<String, VecDeque<JobStatus>>,
    array_statuses: HashMap<String, VecDeque<Vec<JobStatus>>>,
    unreachable: HashSet<String>,
    failing_fetches: HashMap<String, usize>,
    fetches: Vec<(JobHandle, PathBuf)>,
    misfit: Option<f64>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the statuses reported for a job, keyed by handle or job name.
    pub fn script_status(&self, key: &str, statuses: impl IntoIterator<Item = JobStatus>) {
        self.lock().statuses.insert(key.to_string(), statuses.into_iter().collect());
    }

    /// Script the per-task statuses reported for an array job, one entry per query.
    pub fn script_array_status(&self, key: &str, rounds: impl IntoIterator<Item = Vec<JobStatus>>) {
        self.lock().array_statuses.insert(key.to_string(), rounds.into_iter().collect());
    }

    /// Status queries for the job fail until the key is removed.
    pub fn make_unreachable(&self, key: &str) {
        self.lock().unreachable.insert(key.to_string());
    }

    pub fn make_reachable(&self, key: &str) {
        self.lock().unreachable.remove(key);
    }

    /// The next `times` output fetches for the job fail.
    pub fn fail_fetches(&self, key: &str, times: usize) {
        self.lock().failing_fetches.insert(key.to_string(), times);
    }

    /// Every fetched output directory gets a `misfit.json` holding this value.
    pub fn with_misfit(self, misfit: f64) -> Self {
        self.lock().misfit = Some(misfit);
        self
    }

    pub fn submissions(&self) -> Vec<(JobHandle, JobSpec)> {
        self.lock().submissions.clone()
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.lock().submissions.iter().map(|(_, spec)| spec.name.clone()).collect()
    }

    pub fn fetches(&self) -> Vec<(JobHandle, PathBuf)> {
        self.lock().fetches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FakeState {
    /// The handle itself first, then the name it was submitted under.
    fn keys(&self, handle: &JobHandle) -> Vec<String> {
        let mut keys = vec![handle.as_str().to_string()];
        let base = handle.as_str().split('_').next().unwrap_or_default();
        if let Some((_, spec)) = self.submissions.iter().find(|(submitted, _)| submitted.as_str() == base) {
            keys.push(spec.name.clone());
        }
        keys
    }

    fn array_size(&self, handle: &JobHandle) -> Option<u32> {
        self.submissions.iter().find(|(submitted, _)| submitted == handle).and_then(|(_, spec)| spec.array_size)
    }
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl SchedulerClient for FakeScheduler {
    async fn submit(&self, spec: JobSpec) -> Result<JobHandle, SchedulerClientError> {
        let mut state = self.lock();
        state.next_id += 1;
        let handle = JobHandle::new(format!("{}", 1000 + state.next_id));
        state.submissions.push((handle.clone(), spec));
        Ok(handle)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SchedulerClientError> {
        let mut state = self.lock();
        let keys = state.keys(handle);
        if keys.iter().any(|key| state.unreachable.contains(key)) {
            return Err(SchedulerClientError::StatusQuery {
                handle: handle.clone(),
                reason: "scheduler unreachable".to_string(),
            });
        }
        for key in keys {
            if let Some(queue) = state.statuses.get_mut(&key) {
                if let Some(status) = next_scripted(queue) {
                    return Ok(status);
                }
            }
        }
        Ok(JobStatus::Finished)
    }

    async fn array_status(&self, handle: &JobHandle) -> Result<Vec<JobStatus>, SchedulerClientError> {
        let mut state = self.lock();
        let keys = state.keys(handle);
        if keys.iter().any(|key| state.unreachable.contains(key)) {
            return Err(SchedulerClientError::StatusQuery {
                handle: handle.clone(),
                reason: "scheduler unreachable".to_string(),
            });
        }
        for key in keys {
            if let Some(queue) = state.array_statuses.get_mut(&key) {
                if let Some(statuses) = next_scripted(queue) {
                    return Ok(statuses);
                }
            }
        }
        let size = state.array_size(handle).unwrap_or(0);
        Ok(vec![JobStatus::Finished; size as usize])
    }

    async fn fetch_outputs(&self, handle: &JobHandle, destination: &Path) -> Result<(), SchedulerClientError> {
        let misfit = {
            let mut state = self.lock();
            let keys = state.keys(handle);
            for key in keys {
                if let Some(remaining) = state.failing_fetches.get_mut(&key) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(SchedulerClientError::FetchOutputs {
                            handle: handle.clone(),
                            reason: "transfer interrupted".to_string(),
                        });
                    }
                }
            }
            state.fetches.push((handle.clone(), destination.to_path_buf()));
            state.misfit
        };

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| SchedulerClientError::FetchOutputs { handle: handle.clone(), reason: e.to_string() })?;
        if let Some(misfit) = misfit {
            tokio::fs::write(destination.join("misfit.json"), misfit.to_string())
                .await
                .map_err(|e| SchedulerClientError::FetchOutputs { handle: handle.clone(), reason: e.to_string() })?;
        }
        Ok(())
    }
}
