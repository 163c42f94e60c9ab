use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::processor::{ProcessOutcome, Processor};
use crate::queue::{Job, JobQueue};

/// Fixed set of job workers draining a `JobQueue`.
///
/// - Workers are started once, in `spawn`, and run until the queue is
///   closed and empty. There is no other way to stop them.
/// - `join()` waits for all of them to exit; any number of callers may wait.
pub struct WorkerPool {
    live: watch::Sender<usize>,
}

impl WorkerPool {
    /// Spawn `n` workers (at least one). Must be called inside a tokio runtime.
    pub fn spawn(
        n: usize,
        queue: Arc<JobQueue>,
        processor: Arc<dyn Processor>,
        backoff: Arc<dyn BackoffPolicy>,
    ) -> Self {
        let n = n.max(1);
        let (live, _) = watch::channel(n);

        for worker_id in 0..n {
            let worker = JobWorker {
                id: worker_id,
                queue: Arc::clone(&queue),
                processor: Arc::clone(&processor),
                backoff: Arc::clone(&backoff),
            };
            let live = live.clone();

            tokio::spawn(async move {
                let _exit = ExitGuard(live);
                worker.run().await;
            });
        }

        Self { live }
    }

    /// Workers still running.
    pub fn live(&self) -> usize {
        *self.live.borrow()
    }

    /// Wait until every worker has exited.
    ///
    /// This does not ask them to stop: close the queue first.
    pub async fn join(&self) {
        let mut rx = self.live.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Decrements the live-worker count when the worker exits, even by panic.
pub(crate) struct ExitGuard(pub(crate) watch::Sender<usize>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct JobWorker {
    id: usize,
    queue: Arc<JobQueue>,
    processor: Arc<dyn Processor>,
    backoff: Arc<dyn BackoffPolicy>,
}

impl JobWorker {
    async fn run(self) {
        debug!(worker = self.id, "worker started");
        while let Some(job) = self.queue.next().await {
            self.handle(job).await;
        }
        debug!(worker = self.id, "worker exiting, queue closed and drained");
    }

    /// Run every attempt of one job, sequentially, on this worker.
    async fn handle(&self, job: Job) {
        let start = Instant::now();
        self.queue.mark_running(&job.id);
        info!(worker = self.id, job_id = %job.id, "start");

        let max_attempts = job.max_attempts();
        for attempt in 1..=max_attempts {
            let outcome = self.attempt(&job, attempt).await;

            if outcome.success {
                self.queue.mark_done(&job.id);
                info!(
                    worker = self.id,
                    job_id = %job.id,
                    attempts = attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "done"
                );
                return;
            }

            if attempt == max_attempts {
                self.queue.mark_failed(&job.id);
                warn!(
                    worker = self.id,
                    job_id = %job.id,
                    attempts = attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "failed, retries exhausted"
                );
                return;
            }

            let delay = self.backoff.delay(attempt);
            debug!(
                worker = self.id,
                job_id = %job.id,
                attempt,
                attempt_ms = outcome.elapsed.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One processor call on its own tokio task. A panic counts as a failed
    /// attempt and leaves this worker running.
    async fn attempt(&self, job: &Job, attempt: u32) -> ProcessOutcome {
        let processor = Arc::clone(&self.processor);
        let (id, payload) = (job.id.clone(), job.payload.clone());
        let start = Instant::now();

        match tokio::spawn(async move { processor.process(&id, &payload).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    worker = self.id,
                    job_id = %job.id,
                    attempt,
                    panicked = err.is_panic(),
                    "processor aborted"
                );
                ProcessOutcome::failure(start.elapsed())
            }
        }
    }
}
