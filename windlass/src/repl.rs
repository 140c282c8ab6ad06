//! Interactive session driver: reads prompts, prints answers or streamed
//! tokens, and exits on blank input or a quit command.
//!
//! Generic over the reader and writer so tests can drive it with in-memory
//! buffers. Turn-level failures are printed and the session continues;
//! only I/O errors on the terminal itself end the session early.

use std::io::{BufRead, Write};

use futures_util::StreamExt;
use wchat::{ChatEvent, ChatService, ChatSession, ChatTurnRequest};

pub const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplOptions {
    pub streaming: bool,
}

impl ReplOptions {
    pub fn streaming() -> Self {
        Self { streaming: true }
    }
}

pub async fn run_session<R, W>(
    service: &ChatService,
    session: ChatSession,
    options: ReplOptions,
    mut input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "chat with '{}' (blank line, quit, exit, or q to leave)",
        session.model
    )?;

    loop {
        write!(output, "you> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let user_input = line.trim();
        if user_input.is_empty() || EXIT_COMMANDS.contains(&user_input) {
            break;
        }

        let request = ChatTurnRequest::new(session.clone(), user_input);
        if options.streaming {
            run_streaming_turn(service, request.enable_streaming(), &mut output).await?;
        } else {
            match service.run_turn(request).await {
                Ok(result) => writeln!(output, "{}", result.answer)?,
                Err(error) => writeln!(output, "error: {error}")?,
            }
        }
    }

    writeln!(output, "bye")?;
    Ok(())
}

async fn run_streaming_turn<W>(
    service: &ChatService,
    request: ChatTurnRequest,
    output: &mut W,
) -> std::io::Result<()>
where
    W: Write,
{
    let mut stream = match service.stream_turn(request).await {
        Ok(stream) => stream,
        Err(error) => {
            writeln!(output, "error: {error}")?;
            return Ok(());
        }
    };

    let mut printed_text = false;
    while let Some(event) = stream.next().await {
        match event {
            Ok(ChatEvent::TextDelta(delta)) => {
                write!(output, "{delta}")?;
                output.flush()?;
                printed_text = true;
            }
            Ok(ChatEvent::ToolCallRequested(tool_call)) => {
                writeln!(output, "[tool] {}({})", tool_call.name, tool_call.arguments)?;
            }
            Ok(ChatEvent::ToolResultRecorded(_)) => {}
            Ok(ChatEvent::TurnComplete(result)) => {
                if printed_text {
                    writeln!(output)?;
                }
                if !result.termination.is_completed() {
                    writeln!(output, "[{:?}] {}", result.termination, result.answer)?;
                }
            }
            Err(error) => {
                writeln!(output, "error: {error}")?;
                break;
            }
        }
    }

    Ok(())
}
