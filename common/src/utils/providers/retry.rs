use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::warn;

use crate::error::AppError;

/// §4.A retry policy: up to 3 invocations total (1 initial + 2 retries), exponential backoff
/// base 2s capped at 10s, applied only to `ProviderRateLimited`/`ProviderTimeout`/
/// `ProviderUnavailable`. Other failures are terminal and returned on the first attempt.
pub async fn with_provider_retry<F, Fut, T>(operation_label: &str, mut make_call: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(1000)
        .max_delay(Duration::from_secs(10))
        .map(jitter)
        .take(2);

    let mut attempt: u32 = 0;
    let mut strategy = strategy;
    loop {
        attempt += 1;
        match make_call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable_provider_error() && attempt < 3 => {
                let delay = strategy.next().unwrap_or_else(|| Duration::from_secs(10));
                warn!(
                    operation = operation_label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
