//! Job lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a job.
///
/// State transitions:
/// - Queued -> Running -> Done
/// - Queued -> Running -> Failed (retry budget exhausted)
/// - Queued -> Failed (buffer was full at enqueue time)
///
/// Done and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Buffered, waiting for a worker.
    Queued,

    /// Picked up by a worker (attempts in progress, including backoff sleeps).
    Running,

    /// An attempt succeeded.
    Done,

    /// Every attempt failed, or the job never made it into the buffer.
    Failed,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::queued(JobState::Queued, false)]
    #[case::running(JobState::Running, false)]
    #[case::done(JobState::Done, true)]
    #[case::failed(JobState::Failed, true)]
    fn terminal_states(#[case] state: JobState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn serializes_lowercase_like_display() {
        for state in [JobState::Queued, JobState::Running, JobState::Done, JobState::Failed] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
