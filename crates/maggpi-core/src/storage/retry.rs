//! Retry for writes that race each other on the same SQLite file.
//!
//! The scheduler loop and manual refreshes write status and source rows
//! concurrently; SQLite serializes them, and a writer that loses the race
//! past `busy_timeout` gets SQLITE_BUSY/LOCKED back. Those are retried with
//! exponential backoff, anything else is returned as-is.

use std::future::Future;
use std::time::Duration;

pub const MAX_RETRIES: u32 = 4;

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes
/// SQLITE_LOCKED_SHAREDCACHE (262), SQLITE_BUSY_RECOVERY (261),
/// SQLITE_BUSY_SNAPSHOT (517)
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
        ),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 100ms, 200ms, 400ms, 800ms
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2u64.pow(attempt.saturating_sub(1)))
}

/// Run a storage operation, retrying transient lock errors
pub async fn with_retry<F, Fut, T>(what: &str, operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    operation = what,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Database busy, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(4), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_timeout_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
