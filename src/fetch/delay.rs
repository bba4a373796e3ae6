//! Randomised delays: retry backoff and the self-imposed throttle between upstream calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// An inclusive range a delay is drawn uniformly from.
///
/// # Examples
///
/// ```
/// use radiation_sync::DelayRange;
/// use std::time::Duration;
///
/// let backoff = DelayRange::from_secs(5, 15);
/// let delay = backoff.sample();
/// assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(15));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// A range that never sleeps.
    pub const NONE: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Bounds are reordered if given backwards.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_secs(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn contains(&self, delay: Duration) -> bool {
        self.min <= delay && delay <= self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(self.min, self.max)
    }
}

/// Something that can wait. Production code sleeps on the tokio timer; tests record the calls.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
