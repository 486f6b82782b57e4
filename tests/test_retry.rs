//! Integration tests for retry clamping and the retry loop's contract.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use quester::engine::errors::EngineError;
use quester::engine::retry::run_with_retry;
use quester::engine::types::RetryPolicy;

#[test]
fn max_tries_zero_clamps_to_one() {
    assert_eq!(RetryPolicy::new(0, 0).max_tries, 1);
}

#[test]
fn max_tries_above_cap_clamps_to_five() {
    assert_eq!(RetryPolicy::new(99, 0).max_tries, 5);
}

#[test]
fn wait_ms_above_cap_clamps_to_five_thousand() {
    assert_eq!(RetryPolicy::new(1, 999_999).wait_ms, 5000);
}

#[tokio::test]
async fn retry_waits_before_each_retry_not_before_first_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let started = std::time::Instant::now();
    let a = attempts.clone();
    let outcome = run_with_retry("architect", "design_system", RetryPolicy::new(3, 10), &HashSet::new(), move |_| {
        let a = a.clone();
        async move {
            let n = a.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(EngineError::TransportError {
                    worker: "architect".into(),
                    tool: "design_system".into(),
                    message: "503".into(),
                })
            } else {
                Ok(serde_json::json!({"ok": true}))
            }
        }
    })
    .await
    .ok()
    .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert!(started.elapsed().as_millis() >= 20);
}

#[tokio::test]
async fn non_retryable_tool_error_code_stops_after_one_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut non_retryable = HashSet::new();
    non_retryable.insert(-32602);
    let a = attempts.clone();
    let failure = run_with_retry("architect", "design_system", RetryPolicy::new(5, 0), &non_retryable, move |_| {
        let a = a.clone();
        async move {
            a.fetch_add(1, Ordering::SeqCst);
            Err::<serde_json::Value, _>(EngineError::ToolError {
                worker: "architect".into(),
                tool: "design_system".into(),
                code: -32602,
                message: "invalid params".into(),
            })
        }
    })
    .await
    .err()
    .unwrap();

    assert_eq!(failure.attempts, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
