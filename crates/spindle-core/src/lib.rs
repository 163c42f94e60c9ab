//! spindle-core
//!
//! In-process job engine: callers submit jobs into a bounded queue, a fixed
//! pool of workers runs them through a `Processor` with retries spaced by a
//! `BackoffPolicy`, and every job's lifecycle state stays observable.
//!
//! # Modules
//! - **queue**: closable FIFO primitive, `Job`, `JobState`, `JobQueue`
//! - **backoff**: retry delay policies and jitter sources
//! - **processor**: the pluggable unit-of-work capability
//! - **worker**: job workers (pull, attempt, back off, record state)
//! - **pool**: generic task pool for arbitrary async closures
//! - **engine**: builder + graceful shutdown coordinator
//! - **config**: environment-driven settings
//! - **observability**: aggregate views over the state table
//! - **error**: error types

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod worker;

pub use backoff::{BackoffPolicy, ExponentialJitter, FixedBackoff};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{BuildError, EnqueueError, PoolError};
pub use pool::{PoolPhase, TaskPool};
pub use processor::{ProcessOutcome, Processor, RandomProcessor};
pub use queue::{Job, JobQueue, JobState};
