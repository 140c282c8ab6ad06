//! Streaming event contract and in-memory stream utilities.
//!
//! ```rust
//! use wbackend::{BoxedEventStream, StreamEvent, VecEventStream};
//!
//! let stream = VecEventStream::new(vec![Ok(StreamEvent::TextDelta("hello".into()))]);
//! let _boxed: BoxedEventStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{BackendError, ChatResponse, ToolCall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallDelta(ToolCall),
    ResponseComplete(ChatResponse),
}

/// Backend stream contract.
///
/// Invariants for consumers:
/// - Events are emitted in source order.
/// - `TextDelta` and `ToolCallDelta` may appear zero or more times.
/// - `ResponseComplete` is terminal and, when present, arrives after all
///   related deltas.
/// - Once the stream yields `None`, it must not yield additional items.
pub trait BackendEventStream: Stream<Item = Result<StreamEvent, BackendError>> + Send {}

impl<T> BackendEventStream for T where T: Stream<Item = Result<StreamEvent, BackendError>> + Send {}

pub type BoxedEventStream<'a> = Pin<Box<dyn BackendEventStream + 'a>>;

#[derive(Debug)]
pub struct VecEventStream {
    events: VecDeque<Result<StreamEvent, BackendError>>,
}

impl VecEventStream {
    pub fn new(events: Vec<Result<StreamEvent, BackendError>>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl Stream for VecEventStream {
    type Item = Result<StreamEvent, BackendError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<StreamEvent, BackendError>>> {
        Poll::Ready(self.events.pop_front())
    }
}
