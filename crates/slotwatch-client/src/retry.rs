//! Back-off policy for the listing endpoints.
//!
//! Only idempotent GETs go through [`retry_with_backoff`]. Claims and visit
//! preparation create server-side state and are sent exactly once.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// Longest single pause, whatever the attempt number.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// How many times to re-send a listing request and how long to pause first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    /// Extra attempts after the first one.
    pub(crate) retries: u32,
    /// Pause before the first retry; doubles on each further retry.
    pub(crate) base: Duration,
}

impl Backoff {
    /// Pause before retry number `retry` (1-based), scaled by `jitter`.
    ///
    /// `jitter` is expected in `0.75..=1.25`. The unscaled pause is capped at
    /// [`MAX_DELAY`].
    fn delay(self, retry: u32, jitter: f64) -> Duration {
        let doubling = 1u32 << retry.saturating_sub(1).min(10);
        self.base
            .saturating_mul(doubling)
            .min(MAX_DELAY)
            .mul_f64(jitter)
    }
}

/// Whether the booking platform might answer differently a moment later.
///
/// Connection failures, timeouts and 5xx statuses qualify. A rejected
/// session, an `ErrorMessage` envelope, a body that does not parse, and any
/// 4xx status will fail the same way again.
pub(crate) fn is_retriable(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ClientError::UnexpectedStatus { status, .. } => *status >= 500,
        ClientError::AuthExpired { .. }
        | ClientError::Api(_)
        | ClientError::Deserialize { .. }
        | ClientError::InvalidConfig(_) => false,
    }
}

/// Sends `request` until it succeeds, fails for good, or `backoff.retries`
/// extra attempts are spent.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    backoff: Backoff,
    mut request: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut retry = 0u32;
    loop {
        let err = match request().await {
            Ok(value) => return Ok(value),
            Err(err) if retry >= backoff.retries || !is_retriable(&err) => return Err(err),
            Err(err) => err,
        };

        retry += 1;
        let pause = backoff.delay(retry, 0.75 + rand::random::<f64>() * 0.5);
        tracing::warn!(
            retry,
            retries = backoff.retries,
            pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "booking API unavailable, trying again"
        );
        tokio::time::sleep(pause).await;
    }
}
