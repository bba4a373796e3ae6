//! Bounded retry with randomised backoff around one fetch of one period.

use crate::fetch::delay::{DelayRange, Sleeper};
use crate::fetch::error::FetchError;
use log::{info, warn};
use std::future::Future;

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded.
    Success(T),
    /// Every attempt failed to decode; the period is treated as "no data".
    Exhausted { attempts: u32, last_error: FetchError },
    /// A failure that is not retried (anything other than a decode error).
    Aborted(FetchError),
}

impl<T> RetryOutcome<T> {
    pub fn into_success(self) -> Option<T> {
        match self {
            RetryOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Retries decode failures up to `max_attempts` times in total, sleeping a delay drawn from
/// `backoff` between attempts (never after the last one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: DelayRange::from_secs(5, 15),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is raised to at least one.
    pub fn new(max_attempts: u32, backoff: DelayRange) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn backoff(&self) -> DelayRange {
        self.backoff
    }

    /// Runs `attempt` (called with the 1-based attempt number) until it succeeds, fails with a
    /// non-decode error, or the attempt budget is spent.
    pub async fn run<T, F, Fut, S>(&self, sleeper: &S, mut attempt: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        S: Sleeper,
    {
        let mut attempt_no = 1;
        loop {
            match attempt(attempt_no).await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) if e.is_decode() => {
                    warn!(
                        "Decode error on attempt {}/{}: {}",
                        attempt_no, self.max_attempts, e
                    );
                    if attempt_no >= self.max_attempts {
                        warn!("Max retries reached, giving up on this period");
                        return RetryOutcome::Exhausted {
                            attempts: attempt_no,
                            last_error: e,
                        };
                    }
                    let wait = self.backoff.sample();
                    info!("Retrying after {:.1} seconds", wait.as_secs_f64());
                    sleeper.sleep(wait).await;
                    attempt_no += 1;
                }
                Err(e) => return RetryOutcome::Aborted(e),
            }
        }
    }
}
