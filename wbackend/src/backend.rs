//! The chat completion service seam.

use wcommon::BoxFuture;

use crate::{BackendError, BackendKind, BoxedEventStream, ChatRequest, ChatResponse};

pub type BackendFuture<'a, T> = BoxFuture<'a, T>;

/// A chat completion service: takes an ordered conversation plus declared
/// tool schemas, returns assistant text and/or requested tool invocations.
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<ChatResponse, BackendError>>;

    fn stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<BoxedEventStream<'a>, BackendError>>;
}
