//! Observability hooks for the windlass chat loop, tool runtime, and backends.
//!
//! Both hook sets are plain values implementing the hook traits from
//! `wbackend`, `wtooling`, and `wchat`; hand an `Arc` of either (or both,
//! via your own composite) to the builders that accept hooks.

mod metrics_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsHooks;
pub use tracing_hooks::TracingHooks;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wbackend::{BackendError, BackendKind, BackendOperationHooks, ToolCall};
    use wchat::ChatLoopHooks;
    use wtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

    use super::{MetricsHooks, TracingHooks};

    fn sample_call() -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            name: "list_directory".to_string(),
            arguments: "{}".to_string(),
        }
    }

    #[test]
    fn tracing_hooks_cover_every_lifecycle_event_without_panicking() {
        let hooks = TracingHooks;
        let context = ToolExecutionContext::new("observe-1");
        let call = sample_call();

        hooks.on_attempt_start(BackendKind::Ollama, "complete", 1);
        hooks.on_retry_scheduled(
            BackendKind::Ollama,
            "complete",
            1,
            Duration::from_millis(200),
            &BackendError::timeout("slow"),
        );
        hooks.on_success(BackendKind::Ollama, "complete", 2);
        hooks.on_failure(
            BackendKind::Ollama,
            "complete",
            3,
            &BackendError::transport("gone"),
        );

        hooks.on_execution_start(&call, &context);
        hooks.on_execution_success(
            &call,
            &context,
            &ToolExecutionResult::new("call_0", "ok"),
            Duration::from_millis(5),
        );
        hooks.on_execution_failure(
            &call,
            &context,
            &ToolError::execution("boom"),
            Duration::from_millis(5),
        );

        hooks.on_round_start("observe-1", 1);
        hooks.on_tool_dispatch("observe-1", &call);
    }

    #[test]
    fn metrics_hooks_emit_through_the_default_recorder_without_panicking() {
        let hooks = MetricsHooks;
        let context = ToolExecutionContext::new("observe-2");
        let call = sample_call();

        hooks.on_attempt_start(BackendKind::OpenAiCompatible, "complete", 1);
        hooks.on_success(BackendKind::OpenAiCompatible, "complete", 1);
        hooks.on_execution_start(&call, &context);
        hooks.on_execution_success(
            &call,
            &context,
            &ToolExecutionResult::new("call_0", "ok"),
            Duration::from_millis(3),
        );
        hooks.on_round_start("observe-2", 1);
    }

    #[test]
    fn hooks_are_usable_as_shared_trait_objects() {
        let tool_hooks: Arc<dyn ToolRuntimeHooks> = Arc::new(TracingHooks);
        let backend_hooks: Arc<dyn BackendOperationHooks> = Arc::new(MetricsHooks);
        let loop_hooks: Arc<dyn ChatLoopHooks> = Arc::new(MetricsHooks);

        tool_hooks.on_execution_start(&sample_call(), &ToolExecutionContext::new("observe-3"));
        backend_hooks.on_attempt_start(BackendKind::Ollama, "complete", 1);
        loop_hooks.on_round_start("observe-3", 1);
    }
}
