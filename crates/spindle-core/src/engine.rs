//! Engine: wires queue, workers, processor and backoff together and owns
//! the graceful shutdown sequence.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::backoff::{BackoffPolicy, ExponentialJitter};
use crate::config::{DEFAULT_QUEUE_SIZE, DEFAULT_WORKERS, EngineConfig};
use crate::error::{BuildError, EnqueueError};
use crate::observability::QueueCounts;
use crate::processor::Processor;
use crate::queue::{Job, JobQueue, JobState};
use crate::worker::WorkerPool;

/// Builds an `Engine`.
///
/// # Example
/// ```ignore
/// let engine = EngineBuilder::new()
///     .workers(4)
///     .queue_capacity(64)
///     .processor(Arc::new(RandomProcessor::new(20)))
///     .build()?;
/// ```
pub struct EngineBuilder {
    workers: usize,
    queue_capacity: usize,
    processor: Option<Arc<dyn Processor>>,
    backoff: Option<Arc<dyn BackoffPolicy>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_SIZE,
            processor: None,
            backoff: None,
        }
    }

    /// Worker count, queue capacity and backoff from `config`. The processor
    /// still has to be set.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new()
            .workers(config.workers)
            .queue_capacity(config.queue_size)
            .backoff(Arc::new(config.backoff.policy()))
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Validate and start the workers. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Engine, BuildError> {
        if self.workers == 0 {
            return Err(BuildError::NoWorkers);
        }
        let processor = self.processor.ok_or(BuildError::MissingProcessor)?;
        let backoff = self
            .backoff
            .unwrap_or_else(|| Arc::new(ExponentialJitter::default_policy()));

        let queue = Arc::new(JobQueue::new(self.queue_capacity));
        let workers = WorkerPool::spawn(self.workers, Arc::clone(&queue), processor, backoff);
        info!(
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            "engine started"
        );

        Ok(Engine {
            queue,
            workers,
            accepting: AtomicBool::new(true),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Running engine.
///
/// Shutdown order: stop accepting -> close the queue -> wait for workers to
/// drain what was buffered and exit. In-flight attempts are never interrupted.
pub struct Engine {
    queue: Arc<JobQueue>,
    workers: WorkerPool,
    accepting: AtomicBool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Hand a job to the queue. Never waits.
    pub fn submit(&self, job: Job) -> Result<(), EnqueueError> {
        if !self.is_accepting() {
            return Err(EnqueueError::Closed);
        }
        self.queue.enqueue(job)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Graceful shutdown. Returns once every worker has exited; every job
    /// accepted before the call has reached a terminal state by then.
    /// Idempotent, and safe to call concurrently.
    pub async fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!(buffered = self.queue.len(), "shutting down, draining queue");
        }
        self.queue.close();
        self.workers.join().await;

        let counts = self.counts();
        if counts.is_settled() {
            info!(done = counts.done, failed = counts.failed, "engine stopped");
        } else {
            warn!(?counts, "engine stopped with unsettled jobs");
        }
    }

    /// Wait for `signal` (an OS interrupt, a test trigger, ...), then shut down.
    pub async fn run_until<F>(&self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await;
    }

    pub fn state(&self, id: &str) -> Option<JobState> {
        self.queue.state(id)
    }

    pub fn snapshot_states(&self) -> HashMap<String, JobState> {
        self.queue.snapshot_states()
    }

    pub fn counts(&self) -> QueueCounts {
        self.queue.counts()
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn live_workers(&self) -> usize {
        self.workers.live()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::backoff::FixedBackoff;
    use crate::processor::ProcessOutcome;

    struct AlwaysOk;

    #[async_trait]
    impl Processor for AlwaysOk {
        async fn process(&self, _id: &str, _payload: &str) -> ProcessOutcome {
            ProcessOutcome::success(Duration::ZERO)
        }
    }

    struct Slow(Duration, AtomicU32);

    #[async_trait]
    impl Processor for Slow {
        async fn process(&self, _id: &str, _payload: &str) -> ProcessOutcome {
            tokio::time::sleep(self.0).await;
            self.1.fetch_add(1, Ordering::SeqCst);
            ProcessOutcome::success(self.0)
        }
    }

    fn engine(workers: usize, capacity: usize, processor: Arc<dyn Processor>) -> Engine {
        EngineBuilder::new()
            .workers(workers)
            .queue_capacity(capacity)
            .processor(processor)
            .backoff(Arc::new(FixedBackoff(Duration::from_millis(1))))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn build_requires_processor() {
        let res = EngineBuilder::new().build();
        assert!(matches!(res, Err(BuildError::MissingProcessor)));
    }

    #[tokio::test]
    async fn build_rejects_zero_workers() {
        let res = EngineBuilder::new().workers(0).processor(Arc::new(AlwaysOk)).build();
        assert!(matches!(res, Err(BuildError::NoWorkers)));
    }

    #[tokio::test]
    async fn from_config_applies_sizes() {
        let cfg = EngineConfig {
            workers: 2,
            queue_size: 3,
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::from_config(&cfg)
            .processor(Arc::new(AlwaysOk))
            .build()
            .unwrap();

        assert_eq!(engine.queue().capacity(), 3);
        assert_eq!(engine.live_workers(), 2);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn submitted_job_is_done_after_shutdown() {
        let engine = engine(1, 8, Arc::new(AlwaysOk));
        engine.submit(Job::new("t1", "p")).unwrap();

        engine.shutdown().await;

        assert_eq!(engine.snapshot_states()["t1"], JobState::Done);
        assert_eq!(engine.live_workers(), 0);
    }

    #[tokio::test]
    async fn shutdown_drains_buffered_jobs() {
        let slow = Arc::new(Slow(Duration::from_millis(10), AtomicU32::new(0)));
        let engine = engine(2, 16, slow.clone());
        for i in 0..10 {
            engine.submit(Job::new(format!("j{i}"), "")).unwrap();
        }

        engine.shutdown().await;

        assert_eq!(slow.1.load(Ordering::SeqCst), 10);
        assert_eq!(engine.counts().done, 10);
        assert!(engine.counts().is_settled());
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_closed() {
        let engine = engine(1, 4, Arc::new(AlwaysOk));
        engine.shutdown().await;

        assert!(!engine.is_accepting());
        assert_eq!(engine.submit(Job::new("late", "")), Err(EnqueueError::Closed));
        assert_eq!(engine.state("late"), None);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let engine = engine(2, 4, Arc::new(AlwaysOk));
        engine.submit(Job::new("a", "")).unwrap();

        engine.shutdown().await;
        engine.shutdown().await;

        assert_eq!(engine.counts().done, 1);
    }

    #[tokio::test]
    async fn run_until_waits_for_signal() {
        let engine = Arc::new(engine(1, 4, Arc::new(AlwaysOk)));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let runner = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .run_until(async {
                        let _ = rx.await;
                    })
                    .await
            }
        });

        engine.submit(Job::new("before", "")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.is_accepting());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();

        assert!(!engine.is_accepting());
        assert_eq!(engine.state("before"), Some(JobState::Done));
    }
}
