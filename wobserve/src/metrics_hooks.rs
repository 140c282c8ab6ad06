//! Metrics emission for backend attempts, tool executions, and loop rounds.
//!
//! Emits through the `metrics` facade; installing a recorder is the host
//! application's job.
//!
//! ```rust
//! use wbackend::BackendOperationHooks;
//! use wobserve::MetricsHooks;
//!
//! fn accepts_backend_hooks(_hooks: &dyn BackendOperationHooks) {}
//!
//! accepts_backend_hooks(&MetricsHooks);
//! ```

use std::time::Duration;

use wbackend::{BackendError, BackendKind, BackendOperationHooks, ToolCall};
use wchat::{ChatLoopHooks, ChatTurnResult};
use wtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHooks;

impl BackendOperationHooks for MetricsHooks {
    fn on_attempt_start(&self, backend: BackendKind, operation: &str, _attempt: u32) {
        metrics::counter!(
            "windlass_backend_attempt_start_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_retry_scheduled(
        &self,
        backend: BackendKind,
        operation: &str,
        _attempt: u32,
        delay: Duration,
        error: &BackendError,
    ) {
        metrics::counter!(
            "windlass_backend_retry_scheduled_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "windlass_backend_retry_delay_seconds",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(delay.as_secs_f64());
    }

    fn on_success(&self, backend: BackendKind, operation: &str, attempts: u32) {
        metrics::counter!(
            "windlass_backend_success_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "windlass_backend_attempts_per_success",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_failure(
        &self,
        backend: BackendKind,
        operation: &str,
        attempts: u32,
        error: &BackendError,
    ) {
        metrics::counter!(
            "windlass_backend_failure_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "windlass_backend_attempts_per_failure",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }
}

impl ToolRuntimeHooks for MetricsHooks {
    fn on_execution_start(&self, tool_call: &ToolCall, _context: &ToolExecutionContext) {
        metrics::counter!(
            "windlass_tool_execution_start_total",
            "tool_name" => tool_call.name.clone()
        )
        .increment(1);
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "windlass_tool_execution_success_total",
            "tool_name" => tool_call.name.clone()
        )
        .increment(1);
        metrics::histogram!(
            "windlass_tool_execution_duration_seconds",
            "tool_name" => tool_call.name.clone(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "windlass_tool_execution_failure_total",
            "tool_name" => tool_call.name.clone(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "windlass_tool_execution_duration_seconds",
            "tool_name" => tool_call.name.clone(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl ChatLoopHooks for MetricsHooks {
    fn on_round_start(&self, _session_id: &str, _round: u32) {
        metrics::counter!("windlass_chat_round_start_total").increment(1);
    }

    fn on_tool_dispatch(&self, _session_id: &str, tool_call: &ToolCall) {
        metrics::counter!(
            "windlass_chat_tool_dispatch_total",
            "tool_name" => tool_call.name.clone()
        )
        .increment(1);
    }

    fn on_turn_complete(&self, result: &ChatTurnResult) {
        metrics::counter!(
            "windlass_chat_turn_total",
            "termination" => format!("{:?}", result.termination)
        )
        .increment(1);
        metrics::histogram!("windlass_chat_rounds_per_turn").record(result.rounds as f64);
        metrics::histogram!("windlass_chat_tokens_per_turn")
            .record(result.usage.total_tokens as f64);
    }
}
