//! In-memory job queue: bounded buffer + per-job state table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::{ClosableQueue, Job, JobState, PushError};
use crate::error::EnqueueError;
use crate::observability::QueueCounts;

/// Bounded job buffer plus the id -> state table.
///
/// Design:
/// - The state table is the single source of truth for job state and
///   outlives buffer membership (Running/Done/Failed ids are not buffered).
/// - `enqueue` and `close` both run inside the state table's critical
///   section, so a job is never recorded as Queued after the queue closed.
/// - Lock order is always states -> buffer. Workers never hold both.
pub struct JobQueue {
    states: Mutex<HashMap<String, JobState>>,
    buffer: ClosableQueue<Job>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            buffer: ClosableQueue::bounded(capacity),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, JobState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a job without waiting.
    ///
    /// - Closed queue: `EnqueueError::Closed`, state table untouched.
    /// - Full buffer: the job is recorded as `Failed` and `EnqueueError::Full`
    ///   is returned. A full queue is an observable failure, not a drop.
    pub fn enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        let mut states = self.states();
        let id = job.id.clone();

        match self.buffer.try_push(job) {
            Ok(()) => {
                states.insert(id, JobState::Queued);
                Ok(())
            }
            Err(PushError::Closed(_)) => Err(EnqueueError::Closed),
            Err(PushError::Full(_)) => {
                warn!(job_id = %id, "queue full, job rejected");
                states.insert(id, JobState::Failed);
                Err(EnqueueError::Full)
            }
        }
    }

    /// Wait for the next job. `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Job> {
        self.buffer.recv().await
    }

    /// Stop accepting jobs. Already buffered jobs stay available to `next`.
    /// Idempotent.
    pub fn close(&self) {
        let _states = self.states();
        if self.buffer.close() {
            debug!(buffered = self.buffer.len(), "job queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    /// Jobs currently buffered (not yet picked up).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity().unwrap_or(usize::MAX)
    }

    pub fn mark_running(&self, id: &str) {
        self.set_state(id, JobState::Running);
    }

    pub fn mark_done(&self, id: &str) {
        self.set_state(id, JobState::Done);
    }

    pub fn mark_failed(&self, id: &str) {
        self.set_state(id, JobState::Failed);
    }

    fn set_state(&self, id: &str, state: JobState) {
        self.states().insert(id.to_owned(), state);
    }

    pub fn state(&self, id: &str) -> Option<JobState> {
        self.states().get(id).copied()
    }

    /// Independent copy of the state table.
    pub fn snapshot_states(&self) -> HashMap<String, JobState> {
        self.states().clone()
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts::from_states(self.states().values().copied())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn enqueue_records_queued() {
        let q = JobQueue::new(4);
        q.enqueue(Job::new("a", "p")).unwrap();

        assert_eq!(q.state("a"), Some(JobState::Queued));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn full_queue_marks_job_failed() {
        // No worker running, so the single slot stays taken.
        let q = JobQueue::new(1);
        q.enqueue(Job::new("a", "")).unwrap();

        assert_eq!(q.enqueue(Job::new("b", "")), Err(EnqueueError::Full));
        assert_eq!(q.snapshot_states()["b"], JobState::Failed);
        assert_eq!(q.snapshot_states()["a"], JobState::Queued);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let q = JobQueue::new(3);
        let mut rejected = 0;
        for i in 0..10 {
            if q.enqueue(Job::new(format!("job-{i}"), "")).is_err() {
                rejected += 1;
            }
            assert!(q.len() <= q.capacity());
        }
        assert_eq!(rejected, 7);
        assert_eq!(q.counts().failed, 7);
        assert_eq!(q.counts().queued, 3);
    }

    #[test]
    fn enqueue_after_close_is_rejected_without_state() {
        let q = JobQueue::new(4);
        q.close();

        assert_eq!(q.enqueue(Job::new("late", "")), Err(EnqueueError::Closed));
        assert!(q.is_empty());
        assert_eq!(q.state("late"), None);
    }

    #[test]
    fn enqueue_after_close_keeps_previous_state() {
        let q = JobQueue::new(4);
        q.enqueue(Job::new("a", "")).unwrap();
        q.mark_running("a");
        q.mark_done("a");
        q.close();

        assert_eq!(q.enqueue(Job::new("a", "")), Err(EnqueueError::Closed));
        assert_eq!(q.state("a"), Some(JobState::Done));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let q = JobQueue::new(2);
        q.enqueue(Job::new("a", "")).unwrap();

        for _ in 0..5 {
            q.close();
        }

        assert!(q.is_closed());
        assert_eq!(q.next().await.map(|j| j.id), Some("a".to_string()));
        assert_eq!(q.next().await, None);
        assert_eq!(q.enqueue(Job::new("b", "")), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn next_preserves_fifo_order() {
        let q = JobQueue::new(8);
        for id in ["x", "y", "z"] {
            q.enqueue(Job::new(id, "")).unwrap();
        }

        for id in ["x", "y", "z"] {
            assert_eq!(q.next().await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn close_releases_blocked_next() {
        let q = Arc::new(JobQueue::new(1));
        let waiter = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.next().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn duplicate_ids_last_write_wins() {
        let q = JobQueue::new(1);
        q.enqueue(Job::new("dup", "first")).unwrap();
        let _ = q.enqueue(Job::new("dup", "second"));

        // Second copy hit the full buffer and overwrote the first's state.
        assert_eq!(q.state("dup"), Some(JobState::Failed));
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let q = JobQueue::new(2);
        q.enqueue(Job::new("a", "")).unwrap();

        let snap = q.snapshot_states();
        q.mark_running("a");

        assert_eq!(snap["a"], JobState::Queued);
        assert_eq!(q.state("a"), Some(JobState::Running));
    }
}
