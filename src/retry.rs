//! Bounded exponential-backoff retry for a single fallible operation.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{EnrichError, EnrichResult};

/// Retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    #[serde(with = "millis", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,

    /// Upper bound for any single delay.
    #[serde(with = "millis", rename = "max_backoff_ms")]
    pub max_backoff: Duration,

    /// Growth factor applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Delay to wait after the given zero-based attempt failed.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Run `op` until it succeeds, fails terminally, the attempt budget runs
/// out, or `cancel` fires.
///
/// Exhausting the budget returns the last observed error. Cancellation
/// observed before an attempt returns the last error if there was one;
/// cancellation during a backoff sleep returns [`EnrichError::Cancelled`].
pub async fn with_retry<T, F, Fut>(
    cancel: &CancelToken,
    options: &RetryOptions,
    mut op: F,
) -> EnrichResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EnrichResult<T>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut last_error: Option<EnrichError> = None;

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(last_error
                .unwrap_or_else(|| EnrichError::cancelled("cancelled before attempt")));
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        if attempt + 1 == max_attempts {
            last_error = Some(err);
            break;
        }

        let delay = options.backoff_for(attempt);
        warn!(
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "operation failed, retrying"
        );
        last_error = Some(err);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EnrichError::cancelled("cancelled during retry backoff"));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Err(last_error.unwrap_or_else(|| EnrichError::cancelled("no attempt was made")))
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
