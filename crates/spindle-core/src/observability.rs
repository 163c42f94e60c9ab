use serde::{Deserialize, Serialize};

use crate::queue::JobState;

/// Number of jobs per lifecycle state, taken from one state-table snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn from_states(states: impl IntoIterator<Item = JobState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                JobState::Queued => counts.queued += 1,
                JobState::Running => counts.running += 1,
                JobState::Done => counts.done += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.done + self.failed
    }

    /// No job is waiting or in flight.
    pub fn is_settled(&self) -> bool {
        self.queued == 0 && self.running == 0
    }
}
