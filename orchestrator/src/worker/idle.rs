use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

/// Cooperative work the orchestrator may run while it has nothing to poll.
#[async_trait]
pub trait CourtesyWork: Send + Sync {
    /// Runs the next queued item to completion. Returns `false` when nothing was queued.
    async fn run_next(&self) -> bool;
}

/// FIFO of one-shot work items.
#[derive(Default)]
pub struct CourtesyQueue {
    items: Mutex<VecDeque<BoxFuture<'static, ()>>>,
}

impl CourtesyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.lock().push_back(work.boxed());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<BoxFuture<'static, ()>>> {
        // A panicking work item cannot leave the queue itself inconsistent.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CourtesyWork for CourtesyQueue {
    async fn run_next(&self) -> bool {
        let next = self.lock().pop_front();
        match next {
            Some(work) => {
                work.await;
                true
            }
            None => false,
        }
    }
}

/// Suspension between polling rounds that retrieved nothing.
///
/// A wait never ends before `interval` has elapsed, so the scheduler is not polled more
/// often than configured. Courtesy work is run while time remains; an item that outlasts
/// the deadline is allowed to finish.
#[derive(Clone)]
pub struct IdleBackoff {
    interval: Duration,
    courtesy: Option<Arc<dyn CourtesyWork>>,
}

impl IdleBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval, courtesy: None }
    }

    pub fn with_courtesy(mut self, courtesy: Arc<dyn CourtesyWork>) -> Self {
        self.courtesy = Some(courtesy);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits out one interval. Returns the number of courtesy items run meanwhile.
    pub async fn wait(&self) -> usize {
        let deadline = Instant::now() + self.interval;
        let mut ran = 0;

        if let Some(courtesy) = &self.courtesy {
            while Instant::now() < deadline && courtesy.run_next().await {
                ran += 1;
            }
        }

        tokio::time::sleep_until(deadline).await;
        tracing::trace!(interval_secs = self.interval.as_secs_f64(), courtesy_items = ran, "Idle wait finished");
        ran
    }
}
