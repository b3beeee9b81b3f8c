use crate::error::EngineError;
use std::future::Future;
use std::time::Duration;

/// HTTP statuses the gateway never retries — the request itself is wrong
/// (bad key, bad payload), not transiently failing.
pub fn is_retryable_status(status: u16) -> bool {
    !matches!(status, 400 | 401 | 403)
}

/// Exponential backoff capped at 10s, plus small linear jitter, matching
/// `min(2**attempt, 10.0) + 0.05*attempt` seconds.
fn backoff_for_attempt(attempt: u32) -> Duration {
    let exp = 2f64.powi(attempt as i32).min(10.0);
    let jitter = 0.05 * attempt as f64;
    Duration::from_secs_f64(exp + jitter)
}

/// Retries `op` up to `max_attempts` times. `op` returns `Err((engine_err,
/// retryable))`; a non-retryable error aborts immediately. Transparent to
/// callers — they only see the final `Result`.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, (EngineError, bool)>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err((err, retryable)) => {
                attempt += 1;
                if !retryable || attempt >= max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(backoff_for_attempt(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_statuses_are_400_401_403() {
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(403));
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
    }

    #[test]
    fn backoff_caps_at_ten_seconds() {
        assert!(backoff_for_attempt(10).as_secs_f64() < 11.0);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let mut calls = 0;
        let result: Result<i32, EngineError> = with_retries(5, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err((EngineError::LLMUnavailable("timeout".into()), true))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn aborts_immediately_on_non_retryable() {
        let mut calls = 0;
        let result: Result<i32, EngineError> = with_retries(5, || {
            calls += 1;
            async move { Err((EngineError::LLMUnavailable("bad key".into()), false)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
