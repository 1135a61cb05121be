//! Handler registry: resolves a job's `target@method` to invocable work.
//!
//! Handlers are registered by name at startup. Resolution is a plain map lookup,
//! so the set of work a runner can perform is closed and inspectable.

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::{JobId, JobParameters};
use crate::error::{Result, RunnerError};

// ═══════════════════════════════════════════════════════════════════════════════
// Handler Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a handler receives for one attempt.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub job_id: JobId,
    pub target: String,
    pub method: String,
    /// 1-indexed attempt number
    pub attempt: u32,
    pub params: JobParameters,
}

impl HandlerContext {
    pub fn new(
        job_id: JobId,
        target: impl Into<String>,
        method: impl Into<String>,
        attempt: u32,
        params: JobParameters,
    ) -> Self {
        Self {
            job_id,
            target: target.into(),
            method: method.into(),
            attempt,
            params,
        }
    }

    /// Log a message associated with this attempt.
    pub fn log_info(&self, message: &str) {
        tracing::info!(
            job_id = %self.job_id,
            target_name = %self.target,
            method = %self.method,
            attempt = self.attempt,
            message
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handler Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A unit of work that can be dispatched by name.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the work for one attempt.
    ///
    /// Any error returned here, as well as a panic, fails the attempt.
    async fn call(&self, ctx: HandlerContext) -> anyhow::Result<()>;
}

/// Adapter that lets async closures act as handlers.
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn call(&self, ctx: HandlerContext) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handler Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Lookup table from target and method names to handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    targets: BTreeMap<String, BTreeMap<String, Arc<dyn JobHandler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_keys())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; replaces any existing handler for the same pair.
    pub fn register<H>(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        handler: H,
    ) -> &mut Self
    where
        H: JobHandler + 'static,
    {
        let target = target.into();
        let method = method.into();
        let replaced = self
            .targets
            .entry(target.clone())
            .or_default()
            .insert(method.clone(), Arc::new(handler))
            .is_some();

        if replaced {
            tracing::warn!(target_name = %target, method = %method, "Replacing registered job handler");
        } else {
            tracing::debug!(target_name = %target, method = %method, "Registered job handler");
        }
        self
    }

    /// Register an async closure as a handler.
    pub fn register_fn<F, Fut>(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(target, method, FnHandler(f))
    }

    /// Find the handler for `target@method`.
    pub fn resolve(&self, target: &str, method: &str) -> Result<Arc<dyn JobHandler>> {
        if target.trim().is_empty() || method.trim().is_empty() {
            return Err(RunnerError::invalid_job_definition(
                "Target and method are required",
            ));
        }

        let methods = self
            .targets
            .get(target)
            .ok_or_else(|| RunnerError::unknown_target(target))?;

        methods
            .get(method)
            .cloned()
            .ok_or_else(|| RunnerError::unknown_method(target, method))
    }

    /// Run a handler, converting every failure into a `HandlerExecution` error.
    pub async fn invoke(handler: &dyn JobHandler, ctx: HandlerContext) -> Result<()> {
        match AssertUnwindSafe(handler.call(ctx)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RunnerError::handler_execution(format!("{:#}", e))),
            Err(panic) => Err(RunnerError::handler_execution(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    pub fn contains(&self, target: &str, method: &str) -> bool {
        self.targets
            .get(target)
            .is_some_and(|methods| methods.contains_key(method))
    }

    /// Registered target names, sorted.
    pub fn targets(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    /// Methods registered for `target`, sorted. Empty if the target is unknown.
    pub fn methods(&self, target: &str) -> Vec<&str> {
        self.targets
            .get(target)
            .map(|methods| methods.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every registered pair as `Target@method`.
    pub fn handler_keys(&self) -> Vec<String> {
        self.targets
            .iter()
            .flat_map(|(target, methods)| {
                methods.keys().map(move |method| format!("{}@{}", target, method))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.targets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    struct Succeed;

    #[async_trait]
    impl JobHandler for Succeed {
        async fn call(&self, _ctx: HandlerContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Panics;

    #[async_trait]
    impl JobHandler for Panics {
        async fn call(&self, _ctx: HandlerContext) -> anyhow::Result<()> {
            panic!("smtp client exploded");
        }
    }

    fn ctx(params: JobParameters) -> HandlerContext {
        HandlerContext::new(JobId::from("1"), "EmailSender", "send", 1, params)
    }

    #[test]
    fn test_resolve_errors() {
        let mut registry = HandlerRegistry::new();
        registry.register("EmailSender", "send", Succeed);

        assert!(registry.resolve("EmailSender", "send").is_ok());

        let err = registry.resolve("Missing", "send").err().unwrap();
        assert_eq!(err.code(), ErrorCode::UnknownTarget);

        let err = registry.resolve("EmailSender", "archive").err().unwrap();
        assert_eq!(err.code(), ErrorCode::UnknownMethod);

        let err = registry.resolve("", "send").err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidJobDefinition);

        let err = registry.resolve("EmailSender", "").err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidJobDefinition);
    }

    #[test]
    fn test_inspection() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("Reports", "daily", Succeed)
            .register("EmailSender", "send", Succeed)
            .register("EmailSender", "bounce", Succeed);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.targets(), vec!["EmailSender", "Reports"]);
        assert_eq!(registry.methods("EmailSender"), vec!["bounce", "send"]);
        assert!(registry.methods("Nope").is_empty());
        assert!(registry.contains("Reports", "daily"));
        assert!(!registry.contains("Reports", "weekly"));
        assert_eq!(
            registry.handler_keys(),
            vec!["EmailSender@bounce", "EmailSender@send", "Reports@daily"]
        );
    }

    #[tokio::test]
    async fn test_invoke_converts_errors() {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("EmailSender", "send", |ctx: HandlerContext| async move {
            let to: String = ctx.params.arg(0)?;
            Err::<(), _>(anyhow::anyhow!("mailbox {} unavailable", to))
        });

        let handler = registry.resolve("EmailSender", "send").unwrap();
        let err = HandlerRegistry::invoke(handler.as_ref(), ctx(json!(["a@example.com"]).into()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::HandlerExecution);
        assert_eq!(err.message(), "mailbox a@example.com unavailable");

        // Type mismatch surfaces as the same error kind
        let err = HandlerRegistry::invoke(handler.as_ref(), ctx(json!([42]).into()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::HandlerExecution);
        assert!(err.message().contains("argument 0"));
    }

    #[tokio::test]
    async fn test_invoke_catches_panics() {
        let err = HandlerRegistry::invoke(&Panics, ctx(JobParameters::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::HandlerExecution);
        assert!(err.message().contains("smtp client exploded"));
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register("EmailSender", "send", Panics);
        registry.register("EmailSender", "send", Succeed);
        assert_eq!(registry.len(), 1);

        let handler = registry.resolve("EmailSender", "send").unwrap();
        assert!(HandlerRegistry::invoke(handler.as_ref(), ctx(JobParameters::default()))
            .await
            .is_ok());
    }
}
