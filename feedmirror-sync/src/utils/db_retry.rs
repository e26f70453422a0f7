//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock errors. Reconciliation and
//! login seeding can race with each other (and with background enrichment) on
//! the same database file.

use feedmirror_common::{Error, Result};
use std::time::{Duration, Instant};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Retry a database operation with exponential backoff until `max_wait_ms` elapses.
///
/// Only lock contention (`database is locked`) is retried; any other error is
/// returned immediately. Backoff starts at 10ms and doubles up to 1000ms.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "feed reconcile", "login seed")
/// * `max_wait_ms` - Maximum total time to keep retrying
/// * `operation` - Async closure performing the whole unit of work; it is
///   re-run from the start on every attempt
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying database operation");
        }

        let err = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after significant retry period (>2s)"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !err.is_lock_contention() {
            return Err(err);
        }

        let elapsed = start_time.elapsed();
        if elapsed >= max_duration {
            tracing::error!(
                operation = operation_name,
                attempt,
                elapsed_ms = elapsed.as_millis(),
                max_wait_ms,
                "Database operation failed: max retry time exceeded"
            );
            return Err(Error::Internal(format!(
                "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                attempt,
                elapsed.as_millis(),
                max_wait_ms
            )));
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            elapsed_ms = elapsed.as_millis(),
            backoff_ms,
            remaining_ms = max_duration.saturating_sub(elapsed).as_millis(),
            "Database locked, will retry after backoff"
        );

        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
    }
}
