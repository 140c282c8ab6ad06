//! Chat completion service seam and HTTP backends for windlass.
//!
//! The conversation model lives here so the tool loop, the tool runtime,
//! and the adapters all speak the same types.

mod backend;
mod error;
mod model;
mod resilience;
mod secret;
mod stream;

pub mod adapters;

pub mod prelude {
    pub use crate::{
        BackendError, BackendErrorKind, BackendKind, ChatBackend, ChatRequest, ChatResponse,
        Message, Role, StopReason, StreamEvent, TokenUsage, ToolCall, ToolDefinition, ToolResult,
    };
}

pub use backend::{BackendFuture, ChatBackend};
pub use error::{BackendError, BackendErrorKind};
pub use model::{
    BackendKind, ChatRequest, ChatRequestBuilder, ChatResponse, Message, Role, StopReason,
    TokenUsage, ToolCall, ToolDefinition, ToolResult,
};
pub use resilience::{
    BackendOperationHooks, NoopOperationHooks, RetryPolicy, RetryingBackend, execute_with_retry,
};
pub use secret::SecretString;
pub use stream::{BackendEventStream, BoxedEventStream, StreamEvent, VecEventStream};
