//! Retry and politeness utilities for storefront requests.
//!
//! Transient failures (429, timeouts, dropped connections) are retried with
//! jittered exponential backoff. Every attempt first passes through the
//! [`HostThrottle`], which spaces requests to a single host by a fixed delay
//! no matter how many field pipelines are fetching concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::FetchError;

/// Upper bound for a single backoff sleep.
const MAX_DELAY_MS: u64 = 10_000;

/// Returns `true` if `err` is worth another attempt after a backoff delay.
///
/// DNS failures, 404s and other HTTP statuses are answered identically on a
/// retry and propagate immediately.
fn is_retriable(err: &FetchError) -> bool {
    matches!(
        err,
        FetchError::RateLimited { .. } | FetchError::Timeout { .. } | FetchError::Connection { .. }
    )
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// The wait before the n-th retry is `backoff_base_ms * 2^(n-1)` milliseconds,
/// capped at 10 s and scaled by a random factor in `[0.75, 1.25)`. A 429's
/// `Retry-After` raises the wait, up to the same 10 s cap. With
/// `max_retries = 2` the operation runs at most three times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = retry_delay_ms(&err, attempt, backoff_base_ms);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Wait before retry number `attempt` (1-based).
///
/// Jittered exponential backoff, raised to the server's `Retry-After` on a
/// 429, never above [`MAX_DELAY_MS`].
fn retry_delay_ms(err: &FetchError, attempt: u32, backoff_base_ms: u64) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;

    match err {
        FetchError::RateLimited {
            retry_after_secs, ..
        } => jittered
            .max(retry_after_secs.saturating_mul(1000))
            .min(MAX_DELAY_MS),
        _ => jittered,
    }
}

/// Per-host request spacing shared by every pipeline of a [`crate::FetchClient`].
///
/// Each call to [`HostThrottle::wait`] reserves the next free slot for the
/// host and sleeps until it arrives. The lock is only held while reserving,
/// never across the sleep.
#[derive(Debug)]
pub(crate) struct HostThrottle {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn wait(&self, host: &str) {
        if self.delay.is_zero() {
            return;
        }

        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots
                .get(host)
                .copied()
                .filter(|reserved| *reserved > now)
                .unwrap_or(now);
            slots.insert(host.to_owned(), slot + self.delay);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
