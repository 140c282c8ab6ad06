//! One-line import for applications driving a tool-augmented chat session.

pub use crate::repl::{ReplOptions, run_session};
pub use crate::runtime::{LoopBundle, LoopBundleBuilder, chat_service};
pub use crate::tools::{ListDirectoryTool, ReadFileTool, SummarizeTextTool};
pub use crate::util::{
    assistant_message, session, streaming_turn, system_message, tool_result_message, turn,
    user_message,
};
pub use wbackend::prelude::*;
pub use wchat::prelude::*;
