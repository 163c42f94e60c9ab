//! Queue module: closable buffer, job model, lifecycle state, and the
//! in-memory job queue built from them.

mod channel;
mod job;
mod memory;
mod state;

pub use channel::{ClosableQueue, PushError};
pub use job::Job;
pub use memory::JobQueue;
pub use state::JobState;
