//! Generic retry with exponential backoff.
//!
//! Every remote call site uses this one utility instead of growing its
//! own ad hoc loop.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Run `op` up to `max_attempts` times. The delay before attempt `n`
/// is `base_delay * 2^(n-1)`, capped at 30 seconds, with up to 25%
/// additive jitter so concurrent callers do not stampede. The final
/// error is returned once attempts are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < max_attempts => {
                let delay = backoff_delay(base_delay, attempt);
                debug!(attempt, "retryable failure: {err}; backing off {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let scaled = base.as_millis() as f64 * 2f64.powi(attempt as i32);
    let capped = scaled.min(BACKOFF_CAP.as_millis() as f64);
    let jitter = 1.0 + rand::rng().random_range(0.0..0.25);
    Duration::from_millis((capped * jitter) as u64)
}
