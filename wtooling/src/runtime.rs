//! Tool runtime trait and the registry-backed executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_timer::Delay;
use futures_util::future::{Either, select};
use wbackend::{ToolCall, ToolDefinition};

use crate::{
    NoopToolRuntimeHooks, ToolError, ToolExecutionContext, ToolExecutionResult, ToolFuture,
    ToolRegistry, ToolRuntimeHooks,
};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub trait ToolRuntime: Send + Sync {
    /// Schemas for every tool this runtime can execute, declared to the
    /// backend on each request.
    fn definitions(&self) -> Vec<ToolDefinition>;

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>>;
}

/// Resolves calls against a fixed registry and enforces a wall-clock
/// timeout per invocation. Expiry is a tool-level error; the caller decides
/// what to do with it (the chat loop feeds it back to the model).
#[derive(Clone)]
pub struct RegistryToolRuntime {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    hooks: Arc<dyn ToolRuntimeHooks>,
}

impl RegistryToolRuntime {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
            hooks: Arc::new(NoopToolRuntimeHooks),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    async fn run_tool(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> Result<ToolExecutionResult, ToolError> {
        let tool = self.registry.get(&tool_call.name).ok_or_else(|| {
            ToolError::not_found(format!("tool '{}' is not registered", tool_call.name))
        })?;

        let invocation = tool.invoke(&tool_call.arguments, context);
        let output = match select(invocation, Delay::new(self.timeout)).await {
            Either::Left((output, _)) => output?,
            Either::Right(_) => {
                return Err(ToolError::timeout(format!(
                    "tool '{}' did not finish within {:?}",
                    tool_call.name, self.timeout
                )));
            }
        };

        Ok(ToolExecutionResult::from_call(tool_call, output))
    }
}

impl ToolRuntime for RegistryToolRuntime {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>> {
        Box::pin(async move {
            self.hooks.on_execution_start(&tool_call, &context);
            let started = Instant::now();

            match self.run_tool(&tool_call, &context).await {
                Ok(result) => {
                    self.hooks
                        .on_execution_success(&tool_call, &context, &result, started.elapsed());
                    Ok(result)
                }
                Err(error) => {
                    let error = error
                        .with_tool_name(tool_call.name.clone())
                        .with_tool_call_id(tool_call.id.clone());
                    self.hooks
                        .on_execution_failure(&tool_call, &context, &error, started.elapsed());
                    Err(error)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use wbackend::ToolDefinition;

    use super::*;
    use crate::{Tool, ToolErrorKind};

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echoes arguments".to_string(),
                parameters: "{\"type\":\"object\"}".to_string(),
            }
        }

        fn invoke<'a>(
            &'a self,
            args_json: &'a str,
            context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<String, ToolError>> {
            Box::pin(async move {
                Ok(format!("session={} args={}", context.session_id, args_json))
            })
        }
    }

    struct BrokenTool;

    impl Tool for BrokenTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".to_string(),
                description: "Always fails".to_string(),
                parameters: "{\"type\":\"object\"}".to_string(),
            }
        }

        fn invoke<'a>(
            &'a self,
            _args_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<String, ToolError>> {
            Box::pin(async move { Err(ToolError::execution("tool exploded")) })
        }
    }

    struct StuckTool;

    impl Tool for StuckTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "stuck".to_string(),
                description: "Never finishes".to_string(),
                parameters: "{\"type\":\"object\"}".to_string(),
            }
        }

        fn invoke<'a>(
            &'a self,
            _args_json: &'a str,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<String, ToolError>> {
            Box::pin(async move {
                Delay::new(Duration::from_secs(3600)).await;
                Ok("unreachable".to_string())
            })
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl ToolRuntimeHooks for RecordingHooks {
        fn on_execution_start(&self, tool_call: &ToolCall, _context: &ToolExecutionContext) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("start:{}", tool_call.name));
        }

        fn on_execution_success(
            &self,
            tool_call: &ToolCall,
            _context: &ToolExecutionContext,
            _result: &ToolExecutionResult,
            _elapsed: Duration,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("success:{}", tool_call.name));
        }

        fn on_execution_failure(
            &self,
            tool_call: &ToolCall,
            _context: &ToolExecutionContext,
            error: &ToolError,
            _elapsed: Duration,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("failure:{}:{:?}", tool_call.name, error.kind));
        }
    }

    fn call(name: &str, id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn runtime_executes_registered_tool_and_keeps_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("register echo");
        let runtime = RegistryToolRuntime::new(Arc::new(registry));

        let result = runtime
            .execute(call("echo", "call_1"), ToolExecutionContext::new("repl-1"))
            .await
            .expect("execution should succeed");

        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(result.output, "session=repl-1 args={}");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_not_found_error_with_context() {
        let runtime = RegistryToolRuntime::new(Arc::new(ToolRegistry::new()));

        let error = runtime
            .execute(call("missing", "call_2"), ToolExecutionContext::new("repl-2"))
            .await
            .expect_err("execution should fail");

        assert_eq!(error.kind, ToolErrorKind::NotFound);
        assert_eq!(error.tool_name.as_deref(), Some("missing"));
        assert_eq!(error.tool_call_id.as_deref(), Some("call_2"));
    }

    #[tokio::test]
    async fn tool_failure_carries_original_message() {
        let mut registry = ToolRegistry::new();
        registry.register(BrokenTool).expect("register broken");
        let runtime = RegistryToolRuntime::new(Arc::new(registry));

        let error = runtime
            .execute(call("broken", "call_3"), ToolExecutionContext::new("repl-3"))
            .await
            .expect_err("execution should fail");

        assert_eq!(error.kind, ToolErrorKind::Execution);
        assert_eq!(error.message, "tool exploded");
    }

    #[tokio::test]
    async fn slow_tool_times_out_as_tool_level_error() {
        let mut registry = ToolRegistry::new();
        registry.register(StuckTool).expect("register stuck");
        let runtime = RegistryToolRuntime::new(Arc::new(registry))
            .with_timeout(Duration::from_millis(20));

        let error = runtime
            .execute(call("stuck", "call_4"), ToolExecutionContext::new("repl-4"))
            .await
            .expect_err("execution should time out");

        assert_eq!(error.kind, ToolErrorKind::Timeout);
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn hooks_observe_success_and_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("register echo");
        registry.register(BrokenTool).expect("register broken");

        let hooks = Arc::new(RecordingHooks::default());
        let runtime =
            RegistryToolRuntime::new(Arc::new(registry)).with_hooks(hooks.clone());

        runtime
            .execute(call("echo", "call_5"), ToolExecutionContext::new("repl-5"))
            .await
            .expect("echo should succeed");
        runtime
            .execute(call("broken", "call_6"), ToolExecutionContext::new("repl-5"))
            .await
            .expect_err("broken should fail");

        let events = hooks.events.lock().expect("events lock").clone();
        assert_eq!(
            events,
            vec![
                "start:echo".to_string(),
                "success:echo".to_string(),
                "start:broken".to_string(),
                "failure:broken:Execution".to_string(),
            ]
        );
    }
}
