//! Integration tests for the handler registry and the built-in handlers.

use jobrunner_core::error::ErrorCode;
use jobrunner_core::jobs::{
    register_builtin, BackoffStrategy, ExecutorConfig, HandlerContext, HandlerRegistry,
    InMemoryJobStore, JobExecutor, JobRecord, MemoryJobLogger, OutcomeStatus, SYSTEM_TARGET,
};
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Utilities
// ============================================================================

fn builtin_executor() -> (JobExecutor, InMemoryJobStore, MemoryJobLogger) {
    let mut registry = HandlerRegistry::new();
    register_builtin(&mut registry);

    let store = InMemoryJobStore::new();
    let logger = MemoryJobLogger::new();
    let executor = JobExecutor::new(
        Arc::new(store.clone()),
        Arc::new(registry),
        Arc::new(logger.clone()),
        ExecutorConfig::default()
            .with_max_retries(2)
            .with_backoff(BackoffStrategy::immediate()),
    );
    (executor, store, logger)
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_resolution_order() {
    let mut registry = HandlerRegistry::new();
    registry.register_fn("EmailSender", "send", |_ctx: HandlerContext| async {
        Ok::<(), anyhow::Error>(())
    });

    assert!(registry.resolve("EmailSender", "send").is_ok());
    assert_eq!(
        registry.resolve("", "send").err().map(|e| e.code()),
        Some(ErrorCode::InvalidJobDefinition)
    );
    assert_eq!(
        registry.resolve("SmsSender", "send").err().map(|e| e.code()),
        Some(ErrorCode::UnknownTarget)
    );
    assert_eq!(
        registry.resolve("EmailSender", "queue").err().map(|e| e.code()),
        Some(ErrorCode::UnknownMethod)
    );
}

#[test]
fn test_builtin_handler_keys() {
    let mut registry = HandlerRegistry::new();
    register_builtin(&mut registry);

    assert_eq!(
        registry.handler_keys(),
        vec!["System@echo", "System@fail", "System@noop", "System@sleep"]
    );
    assert!(registry.contains(SYSTEM_TARGET, "noop"));
    assert!(!registry.contains(SYSTEM_TARGET, "reboot"));
}

// ============================================================================
// Built-in Handlers Through the Executor
// ============================================================================

#[tokio::test]
async fn test_builtin_noop_and_echo_complete() {
    let (executor, store, logger) = builtin_executor();

    for method in ["noop", "echo"] {
        let id = store
            .insert(JobRecord::new(SYSTEM_TARGET, method, json!({"greeting": "hi"})))
            .await;
        let outcome = executor.execute(&id).await.unwrap();
        assert!(outcome.is_completed(), "{} should complete", method);
    }

    assert_eq!(
        logger.infos_starting_with("Job executed successfully").len(),
        2
    );
}

#[tokio::test]
async fn test_builtin_fail_exhausts_retries() {
    let (executor, store, logger) = builtin_executor();
    let id = store
        .insert(JobRecord::new(SYSTEM_TARGET, "fail", json!(["disk full"])))
        .await;

    let outcome = executor.execute(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(outcome.last_error.as_deref(), Some("disk full"));
    assert_eq!(logger.errors().len(), 3);
}

#[tokio::test]
async fn test_builtin_sleep_requires_duration() {
    let (executor, store, _logger) = builtin_executor();

    let id = store
        .insert(JobRecord::new(SYSTEM_TARGET, "sleep", json!([5])))
        .await;
    assert!(executor.execute(&id).await.unwrap().is_completed());

    let id = store
        .insert(JobRecord::new(SYSTEM_TARGET, "sleep", json!(["soon"])))
        .await;
    let outcome = executor.execute(&id).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("argument 0")));
}
