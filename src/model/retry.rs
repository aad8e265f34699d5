//! Shared retry/backoff primitive used by the model adapter (exponential) and
//! the bus's subscriber redelivery (a fixed delay sequence). Both call sites
//! share one tested implementation rather than each hand-rolling its own
//! sleep loop.

use std::time::Duration;

use rand::Rng;

use crate::error::Result;

/// Exponential backoff: `base * factor^attempt`, jittered by `±jitter_frac`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub factor: f64,
    pub max_attempts: u32,
    pub jitter_frac: f64,
}

impl ExponentialBackoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let unjittered = self.base.as_secs_f64() * self.factor.powi(attempt as i32);
        jittered(unjittered, self.jitter_frac)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff {
            base: Duration::from_millis(200),
            factor: 2.0,
            max_attempts: 5,
            jitter_frac: 0.25,
        }
    }
}

/// A fixed delay sequence, used by the bus's {1s, 5s, 30s} redelivery policy.
#[derive(Debug, Clone)]
pub struct FixedDelaySequence {
    pub delays: Vec<Duration>,
}

impl FixedDelaySequence {
    pub fn bus_default() -> Self {
        FixedDelaySequence {
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(30),
            ],
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        self.delays.get(attempt as usize).copied()
    }

    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32
    }
}

fn jittered(seconds: f64, jitter_frac: f64) -> Duration {
    let mut rng = rand::thread_rng();
    let sign: f64 = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let jitter = seconds * jitter_frac * rng.gen_range(0.0..=1.0) * sign;
    let jittered = (seconds + jitter).max(0.0);
    Duration::from_secs_f64(jittered)
}

/// Runs `op` with exponential backoff, retrying only while `should_retry`
/// returns true for the error and attempts remain. `op` must produce a fresh
/// future each call since futures aren't cloneable.
pub async fn retry_with_backoff<T, F, Fut>(
    backoff: ExponentialBackoff,
    mut op: F,
    should_retry: impl Fn(&crate::error::Error) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if should_retry(&e) && attempt + 1 < backoff.max_attempts => {
                tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
