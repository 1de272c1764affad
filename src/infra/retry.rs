use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::AppError;

/// Runs `op` up to `attempts` times with exponential backoff (base * 2^n).
/// Only `GatewayUnavailable` is retried; every other error is a final answer
/// from the callee and propagates immediately.
pub async fn with_backoff<T, F, Fut>(
    attempts: u32,
    base_ms: u64,
    label: &str,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut last_err = AppError::GatewayUnavailable(label.to_string());

    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            let delay = base_ms.saturating_mul(1 << (attempt - 1));
            sleep(Duration::from_millis(delay)).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::GatewayUnavailable(msg)) => {
                warn!(
                    attempt = attempt + 1,
                    "{} failed with transient error: {}", label, msg
                );
                last_err = AppError::GatewayUnavailable(msg);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, 1, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::GatewayUnavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_gateway_unavailable() {
        let result: Result<(), _> = with_backoff(2, 1, "test", || async {
            Err(AppError::GatewayUnavailable("down".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::GatewayUnavailable(_))));
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(3, 1, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Validation("bad".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
