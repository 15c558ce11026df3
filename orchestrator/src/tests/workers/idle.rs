use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::worker::idle::{CourtesyQueue, CourtesyWork, IdleBackoff};

fn queue_of(items: usize, each: Duration, done: Arc<AtomicUsize>) -> Arc<CourtesyQueue> {
    let queue = Arc::new(CourtesyQueue::new());
    for _ in 0..items {
        let done = done.clone();
        queue.push(async move {
            tokio::time::sleep(each).await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }
    queue
}

#[tokio::test(start_paused = true)]
async fn test_wait_lasts_the_whole_interval() {
    let backoff = IdleBackoff::new(Duration::from_secs(30));
    let start = Instant::now();

    assert_eq!(backoff.wait().await, 0);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_courtesy_work_runs_while_idle() {
    let done = Arc::new(AtomicUsize::new(0));
    let queue = queue_of(3, Duration::from_secs(1), done.clone());
    let backoff = IdleBackoff::new(Duration::from_secs(10)).with_courtesy(queue.clone());
    let start = Instant::now();

    assert_eq!(backoff.wait().await, 3);
    assert_eq!(done.load(Ordering::SeqCst), 3);
    assert!(queue.is_empty());
    // Finishing early does not shorten the wait
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_no_new_courtesy_work_after_the_deadline() {
    let done = Arc::new(AtomicUsize::new(0));
    let queue = queue_of(3, Duration::from_millis(1500), done.clone());
    let backoff = IdleBackoff::new(Duration::from_secs(2)).with_courtesy(queue.clone());
    let start = Instant::now();

    // The second item starts before the deadline and is allowed to finish
    assert_eq!(backoff.wait().await, 2);
    assert_eq!(queue.len(), 1);
    assert_eq!(start.elapsed(), Duration::from_secs(3));

    assert!(queue.run_next().await);
    assert!(!queue.run_next().await);
}
