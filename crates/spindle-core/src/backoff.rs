//! Backoff policy: decides how long a worker sleeps between attempts.

use std::time::Duration;

use rand::Rng;

/// Maps an attempt number (1-indexed) to the wait before the next attempt.
///
/// The worker loop only depends on this trait, so linear, fixed or
/// decorrelated strategies can be swapped in without touching it.
pub trait BackoffPolicy: Send + Sync {
    /// Attempt `0` is treated as `1`.
    fn delay(&self, attempt: u32) -> Duration;
}

/// Source of jitter values, injectable so tests can pin the outcome.
pub trait JitterSource: Send + Sync {
    /// A value uniformly distributed in `[0, bound)`. Zero when `bound` is zero.
    fn sample(&self, bound: Duration) -> Duration;
}

/// Jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, bound: Duration) -> Duration {
        let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
    }
}

/// Always samples the same fraction of the bound.
///
/// `FixedJitter(0.5)` cancels the jitter out exactly; `0.0` gives the
/// lowest possible delay and `1.0` the highest, one nanosecond below the
/// bound.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self, bound: Duration) -> Duration {
        let top = bound.saturating_sub(Duration::from_nanos(1));
        bound.mul_f64(self.0.clamp(0.0, 1.0)).min(top)
    }
}

/// Exponential backoff with a cap and symmetric jitter.
///
/// delay = min(base * 2^(attempt - 1), max) + U[-jitter/2, +jitter/2), floored at zero.
///
/// Example with base=50ms, max=800ms, jitter=0:
/// - attempt 1: 50ms
/// - attempt 2: 100ms
/// - attempt 5: 800ms
/// - attempt 6+: 800ms
#[derive(Debug, Clone)]
pub struct ExponentialJitter<J = ThreadRngJitter> {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
    source: J,
}

impl ExponentialJitter {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self {
            base,
            max,
            jitter,
            source: ThreadRngJitter,
        }
    }

    /// 50ms base, 5s cap, 50ms jitter.
    pub fn default_policy() -> Self {
        Self::new(
            Duration::from_millis(50),
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
    }
}

impl<J: JitterSource> ExponentialJitter<J> {
    /// Replace the jitter source.
    pub fn with_source<K: JitterSource>(self, source: K) -> ExponentialJitter<K> {
        ExponentialJitter {
            base: self.base,
            max: self.max,
            jitter: self.jitter,
            source,
        }
    }

    /// Capped exponential part, before jitter.
    fn capped(&self, attempt: u32) -> Duration {
        let mut delay = self.base.min(self.max);
        for _ in 1..attempt {
            if delay.is_zero() {
                break;
            }
            // Doubling stops at the cap instead of growing past it.
            match delay.checked_mul(2) {
                Some(next) if next < self.max => delay = next,
                _ => {
                    delay = self.max;
                    break;
                }
            }
        }
        delay
    }
}

impl<J: JitterSource> BackoffPolicy for ExponentialJitter<J> {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.capped(attempt.max(1));
        if self.jitter.is_zero() {
            return delay;
        }
        (delay + self.source.sample(self.jitter)).saturating_sub(self.jitter / 2)
    }
}

/// Same delay for every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}
