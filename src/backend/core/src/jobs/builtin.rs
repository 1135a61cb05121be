//! Built-in handlers registered under the `System` target.

use async_trait::async_trait;
use std::time::Duration;

use super::{HandlerContext, HandlerRegistry, JobHandler};

/// Target name shared by all built-in handlers.
pub const SYSTEM_TARGET: &str = "System";

/// Register every built-in handler on `registry`.
pub fn register_builtin(registry: &mut HandlerRegistry) -> &mut HandlerRegistry {
    registry
        .register(SYSTEM_TARGET, "noop", NoopHandler)
        .register(SYSTEM_TARGET, "echo", EchoHandler)
        .register(SYSTEM_TARGET, "sleep", SleepHandler::default())
        .register(SYSTEM_TARGET, "fail", FailHandler)
}

/// Handler: does nothing and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl JobHandler for NoopHandler {
    async fn call(&self, _ctx: HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Handler: logs its parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    async fn call(&self, ctx: HandlerContext) -> anyhow::Result<()> {
        ctx.log_info(&format!("echo: {}", ctx.params.to_value()));
        Ok(())
    }
}

/// Handler: sleeps for `arg 0` milliseconds, capped at `max_millis`.
#[derive(Debug, Clone, Copy)]
pub struct SleepHandler {
    pub max_millis: u64,
}

impl Default for SleepHandler {
    fn default() -> Self {
        Self { max_millis: 60_000 }
    }
}

#[async_trait]
impl JobHandler for SleepHandler {
    async fn call(&self, ctx: HandlerContext) -> anyhow::Result<()> {
        let millis: u64 = ctx.params.arg(0)?;
        let millis = millis.min(self.max_millis);
        ctx.log_info(&format!("Sleeping for {}ms", millis));
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }
}

/// Handler: always fails, with `arg 0` as the message when given.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailHandler;

#[async_trait]
impl JobHandler for FailHandler {
    async fn call(&self, ctx: HandlerContext) -> anyhow::Result<()> {
        let message = ctx
            .params
            .arg::<String>(0)
            .unwrap_or_else(|_| "requested failure".to_string());
        anyhow::bail!(message)
    }
}
