//! Job: the unit of work carried through the queue.

use serde::{Deserialize, Serialize};

/// A unit of work.
///
/// - `id` is caller-supplied and expected to be unique. The queue does not
///   enforce it: a second job with the same id overwrites the first one's
///   recorded state.
/// - `payload` is opaque to the engine and handed to the `Processor` as is.
/// - `max_retries` bounds the attempts *after* the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    #[serde(default)]
    pub payload: String,

    #[serde(default)]
    pub max_retries: u32,
}

impl Job {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            max_retries: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total attempts a worker may spend on this job.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_attempts_counts_first_try() {
        assert_eq!(Job::new("a", "").max_attempts(), 1);
        assert_eq!(Job::new("a", "").with_max_retries(3).max_attempts(), 4);
        assert_eq!(
            Job::new("a", "").with_max_retries(u32::MAX).max_attempts(),
            u32::MAX
        );
    }

    #[test]
    fn missing_fields_default() {
        let job: Job = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(job, Job::new("x", ""));
    }
}
