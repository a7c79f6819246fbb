//! Fixed-delay retry around fallible operations.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Source of wall-clock delay, swappable in tests
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Attempt limit and constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or `max_attempts` is used up.
    ///
    /// Every failure is logged; between attempts the sleeper waits `delay`.
    /// After the last failure the error is logged and returned unchanged.
    pub fn run<T, E, F>(&self, sleeper: &dyn Sleeper, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    warn!("⚠️ Attempt {}/{} failed for {}: {}", attempt, max_attempts, label, e);
                    info!("Retrying {} in {:?}...", label, self.delay);
                    sleeper.sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    error!("❌ Failed {} after {} attempts: {}", label, max_attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Wrap `f` so every call goes through `policy`.
///
/// The returned closure has the same signature as `f`; the argument's
/// `Display` form labels the log lines.
pub fn with_retry<A, T, E, F>(
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    mut f: F,
) -> impl FnMut(A) -> Result<T, E>
where
    A: Clone + Display,
    E: Display,
    F: FnMut(A) -> Result<T, E>,
{
    move |arg: A| {
        let label = arg.to_string();
        policy.run(sleeper.as_ref(), &label, || f(arg.clone()))
    }
}
