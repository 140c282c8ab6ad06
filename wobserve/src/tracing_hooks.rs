//! Structured tracing for backend attempts, tool executions, and loop rounds.
//!
//! ```rust
//! use wchat::ChatLoopHooks;
//! use wobserve::TracingHooks;
//!
//! fn accepts_loop_hooks(_hooks: &dyn ChatLoopHooks) {}
//!
//! accepts_loop_hooks(&TracingHooks);
//! ```

use std::time::Duration;

use wbackend::{BackendError, BackendKind, BackendOperationHooks, ToolCall};
use wchat::{ChatLoopHooks, ChatTurnResult};
use wtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl BackendOperationHooks for TracingHooks {
    fn on_attempt_start(&self, backend: BackendKind, operation: &str, attempt: u32) {
        tracing::info!(
            phase = "backend",
            event = "attempt_start",
            backend = %backend,
            operation,
            attempt
        );
    }

    fn on_retry_scheduled(
        &self,
        backend: BackendKind,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &BackendError,
    ) {
        tracing::warn!(
            phase = "backend",
            event = "retry_scheduled",
            backend = %backend,
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_success(&self, backend: BackendKind, operation: &str, attempts: u32) {
        tracing::info!(
            phase = "backend",
            event = "success",
            backend = %backend,
            operation,
            attempts
        );
    }

    fn on_failure(
        &self,
        backend: BackendKind,
        operation: &str,
        attempts: u32,
        error: &BackendError,
    ) {
        tracing::error!(
            phase = "backend",
            event = "failure",
            backend = %backend,
            operation,
            attempts,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ToolRuntimeHooks for TracingHooks {
    fn on_execution_start(&self, tool_call: &ToolCall, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "execution_start",
            tool_name = tool_call.name,
            tool_call_id = tool_call.id,
            session_id = %context.session_id
        );
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "execution_success",
            tool_name = tool_call.name,
            tool_call_id = tool_call.id,
            session_id = %context.session_id,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "execution_failure",
            tool_name = tool_call.name,
            tool_call_id = tool_call.id,
            session_id = %context.session_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ChatLoopHooks for TracingHooks {
    fn on_round_start(&self, session_id: &str, round: u32) {
        tracing::info!(
            phase = "loop",
            event = "round_start",
            session_id,
            round
        );
    }

    fn on_tool_dispatch(&self, session_id: &str, tool_call: &ToolCall) {
        tracing::info!(
            phase = "loop",
            event = "tool_dispatch",
            session_id,
            tool_name = tool_call.name,
            tool_call_id = tool_call.id
        );
    }

    fn on_turn_complete(&self, result: &ChatTurnResult) {
        tracing::info!(
            phase = "loop",
            event = "turn_complete",
            session_id = result.session_id,
            rounds = result.rounds,
            termination = ?result.termination,
            total_tokens = result.usage.total_tokens
        );
    }
}
