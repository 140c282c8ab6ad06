//! Unified facade over the windlass workspace crates.
//!
//! This crate is the single dependency most applications need: it
//! re-exports the backend, tooling, chat-loop, persistence, and
//! observability crates, and adds ready-made tools, a runtime bundle
//! builder, and an interactive session driver.

mod macros;

pub mod prelude;
pub mod repl;
pub mod runtime;
pub mod tools;
pub mod util;

pub use wbackend;
pub use wchat;
pub use wcommon;
pub use wmemory;
pub use wobserve;
pub use wtooling;

pub use wbackend::{
    BackendError, BackendErrorKind, BackendEventStream, BackendFuture, BackendKind,
    BackendOperationHooks, BoxedEventStream, ChatBackend, ChatRequest, ChatRequestBuilder,
    ChatResponse, Message, NoopOperationHooks, RetryPolicy, RetryingBackend, Role, SecretString,
    StopReason, StreamEvent, TokenUsage, ToolCall, ToolDefinition, ToolResult, VecEventStream,
    execute_with_retry,
};
pub use wchat::{
    ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ChatLoopHooks, ChatPolicy, ChatService,
    ChatServiceBuilder, ChatSession, ChatTurnOptions, ChatTurnRequest, ChatTurnResult,
    ConversationStore, DEFAULT_MAX_TOOL_ROUNDS, InMemoryConversationStore, NoopChatLoopHooks,
    TOOL_ROUND_LIMIT_ANSWER, TurnTermination,
};
pub use wcommon::{BoxFuture, GenerationOptions, MetadataMap, SessionId, TraceId};
pub use wmemory::{MemoryError, MemoryErrorKind, SqliteTranscriptStore};
pub use wobserve::{MetricsHooks, TracingHooks};
pub use wtooling::{
    DEFAULT_TOOL_TIMEOUT, FunctionTool, NoopToolRuntimeHooks, RegistryToolRuntime, Tool,
    ToolError, ToolErrorKind, ToolExecutionContext, ToolExecutionResult, ToolFuture, ToolRegistry,
    ToolRuntime, ToolRuntimeHooks, optional_str, optional_u64, parse_json_object,
    parse_json_object_lenient, parse_json_value, required_str, strip_code_fences,
};

pub use repl::{ReplOptions, run_session};
pub use runtime::{LoopBundle, LoopBundleBuilder, chat_service};
#[cfg(feature = "backend-ollama")]
pub use runtime::{local_ollama_backend, local_ollama_bundle};
pub use tools::{ListDirectoryTool, ReadFileTool, SummarizeTextTool};
pub use util::{
    assistant_message, session, streaming_turn, system_message, tool_result_message, turn,
    user_message,
};

#[cfg(test)]
mod tests {
    use crate::Role;

    #[test]
    fn wl_msg_macro_creates_expected_message() {
        let message = crate::wl_msg!(user => "hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "hello");
    }

    #[test]
    fn wl_messages_macro_builds_message_vector() {
        let messages = crate::wl_messages![
            system => "You are concise.",
            user => "List the files here.",
        ];

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn wl_session_macro_supports_optional_system_prompt() {
        let bare = crate::wl_session!("repl-1", "llama3.2");
        assert!(bare.system_prompt.is_none());

        let prompted = crate::wl_session!("repl-2", "llama3.2", "Be brief.");
        assert_eq!(prompted.system_prompt.as_deref(), Some("Be brief."));
    }
}
