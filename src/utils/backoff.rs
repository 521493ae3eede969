//! Constant-backoff retry for outer-layer operations.
//!
//! Only the top-level "ensure this dependency" step is retried, and only a fixed small number
//! of times: enough to ride over one transient network blip without masking persistent
//! failures.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tracing::warn;

/// Runs `operation`, retrying up to `retries` more times with a constant `delay` in between.
///
/// The last error is returned once the retries are exhausted.
pub async fn retry_with_fixed_backoff<T>(
    label: &str,
    retries: usize,
    delay: Duration,
    mut operation: impl AsyncFnMut() -> Result<T>,
) -> Result<T> {
    let mut delays = FixedInterval::new(delay).take(retries);
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => match delays.next() {
                Some(delay) => {
                    warn!("{label} failed, retrying in {}ms: {e:#}", delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
                None => return Err(e),
            },
        }
    }
}
