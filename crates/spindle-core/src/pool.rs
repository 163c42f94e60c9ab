//! Generic task pool: fixed workers running arbitrary async closures.
//!
//! Independent of jobs and job state. Lifecycle:
//! running -> stopping -> stopped, entered once by the first `stop` or
//! `stop_wait` call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{oneshot, watch};
use tracing::{debug, error};

use crate::error::PoolError;
use crate::queue::{ClosableQueue, PushError};
use crate::worker::ExitGuard;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Task = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    Running,
    /// Stop requested, some workers still busy.
    Stopping,
    /// Every worker has exited.
    Stopped,
}

struct Shared {
    tasks: ClosableQueue<Task>,
    /// One-shot gate for the running -> stopping transition.
    stopped: AtomicBool,
    /// Set by `stop`: workers exit after their current task instead of draining.
    abandon: AtomicBool,
    /// Tasks picked up and fully executed (pool-wide).
    completed: AtomicU64,
    live: watch::Sender<usize>,
}

pub struct TaskPool {
    shared: Arc<Shared>,
}

impl TaskPool {
    /// Start `workers` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (live, _) = watch::channel(workers);
        let shared = Arc::new(Shared {
            tasks: ClosableQueue::unbounded(),
            stopped: AtomicBool::new(false),
            abandon: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            live,
        });

        for worker_id in 0..workers {
            tokio::spawn(worker_loop(worker_id, Arc::clone(&shared)));
        }

        Self { shared }
    }

    /// Queue `task` for execution and return immediately.
    pub fn submit<F, Fut>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: Task = Box::new(move || Box::pin(task()) as BoxFuture);
        self.shared.tasks.try_push(task).map_err(|e| match e {
            // Unbounded queue: only closure can reject.
            PushError::Closed(_) | PushError::Full(_) => PoolError::Stopped,
        })
    }

    /// Queue `task` and wait until it has finished running.
    ///
    /// Returns `PoolError::Abandoned` if `stop` dropped it before it ran.
    pub async fn submit_wait<F, Fut>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.submit(move || async move {
            task().await;
            let _ = done_tx.send(());
        })?;
        done_rx.await.map_err(|_| PoolError::Abandoned)
    }

    /// Stop accepting tasks. Each worker finishes the task it is running (or
    /// the one it picks next), then exits; tasks still queued may never run.
    /// Does not wait. Idempotent.
    pub fn stop(&self) {
        self.begin_stop(true);
    }

    /// Stop accepting tasks and wait until all workers have exited.
    ///
    /// When this is the first stop call, every task accepted before it runs
    /// to completion first. After a plain `stop` it only waits for the
    /// workers.
    pub async fn stop_wait(&self) {
        self.begin_stop(false);
        let mut rx = self.shared.live.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn begin_stop(&self, abandon: bool) {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        // Set before closing so a worker woken by the close sees it.
        self.shared.abandon.store(abandon, Ordering::Release);
        self.shared.tasks.close();
        debug!(abandon, queued = self.shared.tasks.len(), "task pool stopping");
    }

    pub fn phase(&self) -> PoolPhase {
        if !self.shared.stopped.load(Ordering::Acquire) {
            PoolPhase::Running
        } else if *self.shared.live.borrow() > 0 {
            PoolPhase::Stopping
        } else {
            PoolPhase::Stopped
        }
    }

    /// Tasks that have been picked up and run to completion.
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.tasks.len()
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    let _exit = ExitGuard(shared.live.clone());

    while let Some(task) = shared.tasks.recv().await {
        // Both the closure call and its future run on their own tokio task,
        // so a panic in either only loses that task.
        if let Err(err) = tokio::spawn(async move { task().await }).await
            && err.is_panic()
        {
            error!(worker = worker_id, "task panicked");
        }
        shared.completed.fetch_add(1, Ordering::AcqRel);

        if shared.abandon.load(Ordering::Acquire) {
            break;
        }
    }

    if shared.abandon.load(Ordering::Acquire) {
        let left = shared.tasks.drain().len();
        if left > 0 {
            debug!(worker = worker_id, dropped = left, "dropped unstarted tasks");
        }
    }
}
