use orchestrator_scheduler_client_interface::JobHandle;
use serde::{Deserialize, Serialize};

/// Persisted submission state of one (event, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobRecord {
    /// Scheduler-assigned identifier; empty until submission.
    pub name: String,
    pub submitted: bool,
    pub retrieved: bool,
    pub repost_count: u32,
    /// Index of this event's sub-task when the stage ran as a shared array job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_index: Option<u32>,
}

impl JobRecord {
    /// Submitted but not yet retrieved.
    pub fn is_outstanding(&self) -> bool {
        self.submitted && !self.retrieved
    }

    /// Handle of the job as the scheduler knows it.
    pub fn handle(&self) -> JobHandle {
        JobHandle::new(self.name.as_str())
    }

    /// Handle addressing this event's own job: the array sub-task when there is one.
    pub fn task_handle(&self) -> JobHandle {
        match self.array_index {
            Some(index) => self.handle().array_task(index),
            None => self.handle(),
        }
    }
}
