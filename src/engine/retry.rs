use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::engine::errors::EngineError;
use crate::engine::types::RetryPolicy;

/// Outcome of a retried operation: the successful value plus bookkeeping
/// the caller needs to build a `RunRecord` (attempt count, elapsed time).
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Outcome when every attempt is exhausted: the last error plus the same
/// bookkeeping.
pub struct RetryFailure {
    pub error: EngineError,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Runs `operation` up to `policy.max_tries` times, sleeping
/// `policy.wait_ms` before each retry (never before the first attempt).
/// Stops early on a non-retryable error. `worker`/`tool` are only used for
/// log fields.
pub async fn run_with_retry<T, F, Fut>(
    worker: &str,
    tool: &str,
    policy: RetryPolicy,
    non_retryable_codes: &HashSet<i64>,
    mut operation: F,
) -> Result<RetryOutcome<T>, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(worker, tool, attempt, "attempt succeeded after retry");
                }
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                    elapsed: started.elapsed(),
                });
            }
            Err(err) => {
                let retryable = err.is_retryable(non_retryable_codes);
                if !retryable || attempt >= policy.max_tries {
                    warn!(
                        worker,
                        tool,
                        attempt,
                        max = policy.max_tries,
                        error = %err,
                        "attempt failed, no further retries"
                    );
                    return Err(RetryFailure {
                        error: err,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }

                warn!(
                    worker,
                    tool,
                    attempt,
                    max = policy.max_tries,
                    wait_ms = policy.wait_ms,
                    error = %err,
                    "attempt failed, retrying"
                );
                if policy.wait_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(policy.wait_ms)).await;
                }
                attempt += 1;
            }
        }
    }
}
