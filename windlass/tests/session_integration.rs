use std::sync::Arc;

use windlass::prelude::*;
use windlass::{BackendFuture, BoxedEventStream, SqliteTranscriptStore, VecEventStream};

/// Backend that answers with tool calls until it has seen a tool result,
/// then closes the turn with a short answer.
struct FileChatBackend;

impl FileChatBackend {
    fn respond(&self, request: &ChatRequest) -> ChatResponse {
        let has_tool_result = request
            .messages
            .iter()
            .any(|message| message.role == Role::Tool);

        if has_tool_result {
            ChatResponse {
                backend: BackendKind::Ollama,
                model: request.model.clone(),
                content: "Your notes file lists three follow-ups.".to_string(),
                tool_calls: Vec::new(),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 14,
                    output_tokens: 9,
                    total_tokens: 23,
                },
            }
        } else {
            ChatResponse {
                backend: BackendKind::Ollama,
                model: request.model.clone(),
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_0".to_string(),
                    name: "read_file_contents".to_string(),
                    arguments: "{\"file_path\":\"notes.txt\"}".to_string(),
                }],
                stop_reason: StopReason::ToolUse,
                usage: TokenUsage {
                    input_tokens: 12,
                    output_tokens: 6,
                    total_tokens: 18,
                },
            }
        }
    }
}

impl ChatBackend for FileChatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<ChatResponse, BackendError>> {
        Box::pin(async move { Ok(self.respond(&request)) })
    }

    fn stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<BoxedEventStream<'a>, BackendError>> {
        Box::pin(async move {
            let response = self.respond(&request);
            let mut events = Vec::new();
            if !response.content.is_empty() {
                events.push(Ok(StreamEvent::TextDelta(response.content.clone())));
            }
            events.push(Ok(StreamEvent::ResponseComplete(response)));
            Ok(Box::pin(VecEventStream::new(events)) as BoxedEventStream<'a>)
        })
    }
}

fn notes_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("windlass-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create notes dir");
    std::fs::write(
        dir.join("notes.txt"),
        "follow up on the report\nping the vendor\nfile the expense\n",
    )
    .expect("write notes file");
    dir
}

#[tokio::test]
async fn bundle_runs_a_real_tool_and_persists_the_exchange() {
    let dir = notes_dir();

    let mut registry = ToolRegistry::new();
    registry
        .register(windlass::ReadFileTool::new(&dir))
        .expect("register read_file_contents");

    let store = Arc::new(SqliteTranscriptStore::new_in_memory().expect("open sqlite store"));
    let bundle = windlass::LoopBundleBuilder::new(Arc::new(FileChatBackend))
        .registry(registry)
        .store(store.clone())
        .max_tool_rounds(2)
        .build();

    let session = ChatSession::new("notes-1", "llama3.2");
    let result = bundle
        .chat
        .run_turn(ChatTurnRequest::new(session.clone(), "what do my notes say?"))
        .await
        .expect("turn should succeed");

    assert_eq!(result.answer, "Your notes file lists three follow-ups.");
    assert!(result.termination.is_completed());

    // user, tool request, tool result, final answer — all durably stored.
    let saved = store
        .load_messages("notes-1")
        .await
        .expect("load persisted transcript");
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[1].tool_calls[0].name, "read_file_contents");
    assert_eq!(saved[2].tool_call_id.as_deref(), Some("call_0"));
    assert!(saved[2].content.contains("ping the vendor"));

    // A later turn in the same session replays the stored history.
    let second = bundle
        .chat
        .run_turn(ChatTurnRequest::new(session, "thanks"))
        .await
        .expect("second turn should succeed");
    assert_eq!(second.transcript.len(), saved.len() + 2);

    std::fs::remove_dir_all(&dir).expect("cleanup notes dir");
}

#[tokio::test]
async fn duplicate_tool_registration_is_rejected_at_startup() {
    let mut registry = ToolRegistry::new();
    registry
        .register(windlass::ListDirectoryTool::default())
        .expect("first registration should succeed");

    let error = registry
        .register(windlass::ListDirectoryTool::default())
        .expect_err("second registration should fail");
    assert_eq!(error.kind, ToolErrorKind::Duplicate);
}
