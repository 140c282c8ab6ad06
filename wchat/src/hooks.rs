//! Lifecycle hooks observed by the dispatch loop.
//!
//! ```rust
//! use wchat::{ChatLoopHooks, NoopChatLoopHooks};
//!
//! fn accepts_hooks(_hooks: &dyn ChatLoopHooks) {}
//!
//! accepts_hooks(&NoopChatLoopHooks);
//! ```

use wbackend::ToolCall;

use crate::ChatTurnResult;

pub trait ChatLoopHooks: Send + Sync {
    fn on_round_start(&self, _session_id: &str, _round: u32) {}

    fn on_tool_dispatch(&self, _session_id: &str, _tool_call: &ToolCall) {}

    fn on_turn_complete(&self, _result: &ChatTurnResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatLoopHooks;

impl ChatLoopHooks for NoopChatLoopHooks {}
