use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;

/// Result of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub success: bool,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn success(elapsed: Duration) -> Self {
        Self {
            success: true,
            elapsed,
        }
    }

    pub fn failure(elapsed: Duration) -> Self {
        Self {
            success: false,
            elapsed,
        }
    }
}

/// Performs the actual work for a job.
///
/// The engine treats this as opaque, possibly slow and possibly flaky.
/// Failures are reported through `ProcessOutcome::success`; they are not
/// errors and never leave the retry loop.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, id: &str, payload: &str) -> ProcessOutcome;
}

/// Simulated processor: sleeps a random 100..=500ms, then fails with
/// probability `error_rate` percent.
#[derive(Debug, Clone)]
pub struct RandomProcessor {
    error_rate: u8,
    min_latency: Duration,
    max_latency: Duration,
}

impl RandomProcessor {
    /// `error_rate` is a percentage and is clamped to 0..=100.
    pub fn new(error_rate: u8) -> Self {
        Self {
            error_rate: error_rate.min(100),
            min_latency: Duration::from_millis(100),
            max_latency: Duration::from_millis(500),
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    pub fn error_rate(&self) -> u8 {
        self.error_rate
    }
}

#[async_trait]
impl Processor for RandomProcessor {
    async fn process(&self, _id: &str, _payload: &str) -> ProcessOutcome {
        // ThreadRng is not Send; keep it out of the await.
        let (latency, roll) = {
            let mut rng = rand::thread_rng();
            let latency = rng.gen_range(self.min_latency..=self.max_latency);
            (latency, rng.gen_range(0..100u8))
        };

        let start = Instant::now();
        tokio::time::sleep(latency).await;
        let elapsed = start.elapsed();

        if roll >= self.error_rate {
            ProcessOutcome::success(elapsed)
        } else {
            ProcessOutcome::failure(elapsed)
        }
    }
}
