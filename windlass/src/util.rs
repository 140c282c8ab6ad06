//! Small convenience constructors for common types.

use wbackend::{Message, ToolResult};
use wchat::{ChatSession, ChatTurnRequest};

pub fn system_message(content: impl Into<String>) -> Message {
    Message::system(content)
}

pub fn user_message(content: impl Into<String>) -> Message {
    Message::user(content)
}

pub fn assistant_message(content: impl Into<String>) -> Message {
    Message::assistant(content)
}

pub fn tool_result_message(
    tool_call_id: impl Into<String>,
    output: impl Into<String>,
) -> Message {
    Message::tool_result(ToolResult {
        tool_call_id: tool_call_id.into(),
        output: output.into(),
    })
}

pub fn session(id: impl Into<String>, model: impl Into<String>) -> ChatSession {
    ChatSession::new(id, model)
}

pub fn turn(session: ChatSession, user_input: impl Into<String>) -> ChatTurnRequest {
    ChatTurnRequest::new(session, user_input)
}

pub fn streaming_turn(session: ChatSession, user_input: impl Into<String>) -> ChatTurnRequest {
    ChatTurnRequest::new(session, user_input).enable_streaming()
}
