use thiserror::Error;

/// Why a job was not accepted into the queue.
///
/// Both variants are returned synchronously to the caller; processing
/// failures never surface here, they end up as `JobState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue no longer accepts work (shutdown in progress or done).
    #[error("queue closed")]
    Closed,

    /// The buffer is at capacity. The job is recorded as failed.
    #[error("queue full")]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("task pool stopped")]
    Stopped,

    /// The task was accepted but dropped unrun by `TaskPool::stop`.
    #[error("task abandoned before it ran")]
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("no processor configured")]
    MissingProcessor,
}
