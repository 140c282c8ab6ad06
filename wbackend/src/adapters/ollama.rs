//! Native Ollama chat backend (`/api/chat`, NDJSON streaming).

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::{classify_reqwest_error, classify_status, truncate_body};
use crate::{
    BackendError, BackendFuture, BackendKind, BoxedEventStream, ChatBackend, ChatRequest,
    ChatResponse, Message, Role, StopReason, StreamEvent, TokenUsage, ToolCall,
};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub type OllamaChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OllamaChatReply, BackendError>> + Send + 'a>>;

/// Wire-level transport for the native Ollama chat endpoint.
pub trait OllamaTransport: Send + Sync {
    fn chat<'a>(
        &'a self,
        payload: OllamaChatPayload,
    ) -> BackendFuture<'a, Result<OllamaChatReply, BackendError>>;

    fn chat_stream<'a>(
        &'a self,
        payload: OllamaChatPayload,
    ) -> BackendFuture<'a, Result<OllamaChunkStream<'a>, BackendError>>;
}

#[derive(Clone)]
pub struct OllamaBackend {
    transport: Arc<dyn OllamaTransport>,
    fallback_model: String,
}

impl OllamaBackend {
    pub fn new(transport: Arc<dyn OllamaTransport>) -> Self {
        Self {
            transport,
            fallback_model: "llama3.2".to_string(),
        }
    }

    /// Backend talking to a local Ollama daemon at the default address.
    pub fn local(client: Client) -> Self {
        Self::new(Arc::new(OllamaHttpTransport::new(client)))
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    fn build_payload(
        &self,
        request: ChatRequest,
        stream: bool,
    ) -> Result<OllamaChatPayload, BackendError> {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.clone()
        } else {
            request.model
        };

        let messages = request
            .messages
            .into_iter()
            .map(OllamaWireMessage::from)
            .collect::<Vec<_>>();

        let tools = request
            .tools
            .into_iter()
            .map(|tool| {
                let parameters = serde_json::from_str::<Value>(&tool.parameters).map_err(|_| {
                    BackendError::invalid_request(format!(
                        "tool '{}' parameters must be valid JSON",
                        tool.name
                    ))
                })?;

                Ok(OllamaWireTool {
                    kind: "function".to_string(),
                    function: OllamaWireToolFunction {
                        name: tool.name,
                        description: tool.description,
                        parameters,
                    },
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        let options = if request.options.temperature.is_none()
            && request.options.max_tokens.is_none()
        {
            None
        } else {
            Some(OllamaWireOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
            })
        };

        Ok(OllamaChatPayload {
            model,
            messages,
            tools,
            options,
            stream,
        })
    }
}

impl ChatBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<ChatResponse, BackendError>> {
        Box::pin(async move {
            request.validate()?;
            let payload = self.build_payload(request, false)?;
            let reply = self.transport.chat(payload).await?;
            Ok(map_reply(reply))
        })
    }

    fn stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<BoxedEventStream<'a>, BackendError>> {
        Box::pin(async move {
            request.validate()?;
            let payload = self.build_payload(request, true)?;
            let mut chunks = self.transport.chat_stream(payload).await?;

            let stream = try_stream! {
                let mut content = String::new();
                let mut tool_calls: Vec<ToolCall> = Vec::new();
                let mut model = None::<String>;
                let mut final_reply = None::<OllamaChatReply>;

                while let Some(chunk) = chunks.next().await {
                    let reply = chunk?;
                    if model.is_none() {
                        model = Some(reply.model.clone());
                    }

                    if !reply.message.content.is_empty() {
                        content.push_str(&reply.message.content);
                        yield StreamEvent::TextDelta(reply.message.content.clone());
                    }

                    for wire_call in &reply.message.tool_calls {
                        let tool_call = correlate_tool_call(tool_calls.len(), wire_call);
                        tool_calls.push(tool_call.clone());
                        yield StreamEvent::ToolCallDelta(tool_call);
                    }

                    if reply.done {
                        final_reply = Some(reply);
                        break;
                    }
                }

                let (stop_reason, usage, model) = match final_reply {
                    Some(reply) => (
                        parse_done_reason(reply.done_reason.as_deref(), !tool_calls.is_empty()),
                        usage_from_counts(reply.prompt_eval_count, reply.eval_count),
                        reply.model,
                    ),
                    None => (
                        StopReason::Other,
                        TokenUsage::default(),
                        model.unwrap_or_default(),
                    ),
                };

                yield StreamEvent::ResponseComplete(ChatResponse {
                    backend: BackendKind::Ollama,
                    model,
                    content,
                    tool_calls,
                    stop_reason,
                    usage,
                });
            };

            Ok(Box::pin(stream) as BoxedEventStream<'a>)
        })
    }
}

/// Lists model names known to a local Ollama daemon.
pub async fn list_local_models() -> Result<Vec<String>, BackendError> {
    list_models_at(OLLAMA_BASE_URL).await
}

pub async fn list_models_at(base_url: impl Into<String>) -> Result<Vec<String>, BackendError> {
    let base_url = base_url.into();
    let endpoint = format!("{}/api/tags", base_url.trim_end_matches('/'));

    let response = Client::new()
        .get(endpoint)
        .send()
        .await
        .map_err(classify_reqwest_error)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(
            status,
            format!("http {status}: {}", truncate_body(&body, 4096)),
        ));
    }

    let parsed = response
        .json::<OllamaTagsReply>()
        .await
        .map_err(|err| BackendError::transport(err.to_string()))?;

    let mut names = parsed
        .models
        .into_iter()
        .map(|model| model.name)
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

fn map_reply(reply: OllamaChatReply) -> ChatResponse {
    let tool_calls = reply
        .message
        .tool_calls
        .iter()
        .enumerate()
        .map(|(index, wire_call)| correlate_tool_call(index, wire_call))
        .collect::<Vec<_>>();

    let stop_reason = parse_done_reason(reply.done_reason.as_deref(), !tool_calls.is_empty());

    ChatResponse {
        backend: BackendKind::Ollama,
        model: reply.model,
        content: reply.message.content,
        tool_calls,
        stop_reason,
        usage: usage_from_counts(reply.prompt_eval_count, reply.eval_count),
    }
}

// The native API does not assign call ids; synthesize one per response so
// results can still be correlated downstream.
fn correlate_tool_call(index: usize, wire_call: &OllamaWireToolCall) -> ToolCall {
    ToolCall {
        id: format!("call_{index}"),
        name: wire_call.function.name.clone(),
        arguments: wire_call.function.arguments.to_string(),
    }
}

fn parse_done_reason(done_reason: Option<&str>, has_tool_calls: bool) -> StopReason {
    if has_tool_calls {
        return StopReason::ToolUse;
    }

    match done_reason {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::Other,
    }
}

fn usage_from_counts(prompt_eval_count: Option<u32>, eval_count: Option<u32>) -> TokenUsage {
    let input_tokens = prompt_eval_count.unwrap_or(0);
    let output_tokens = eval_count.unwrap_or(0);
    TokenUsage {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
    }
}

#[derive(Debug, Clone)]
pub struct OllamaHttpTransport {
    client: Client,
    base_url: String,
}

impl OllamaHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn parse_error(response: reqwest::Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OllamaErrorReply>(&body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| format!("http {status}: {}", truncate_body(&body, 4096)));

        classify_status(status, message)
    }
}

impl OllamaTransport for OllamaHttpTransport {
    fn chat<'a>(
        &'a self,
        payload: OllamaChatPayload,
    ) -> BackendFuture<'a, Result<OllamaChatReply, BackendError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("api/chat"))
                .json(&payload)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            response
                .json::<OllamaChatReply>()
                .await
                .map_err(|err| BackendError::transport(err.to_string()))
        })
    }

    fn chat_stream<'a>(
        &'a self,
        payload: OllamaChatPayload,
    ) -> BackendFuture<'a, Result<OllamaChunkStream<'a>, BackendError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("api/chat"))
                .json(&payload)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let mut bytes = response.bytes_stream();
            let stream = try_stream! {
                let mut buffer = String::new();

                while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(classify_reqwest_error)?;
                    let text = std::str::from_utf8(&chunk)
                        .map_err(|err| BackendError::transport(err.to_string()))?;
                    buffer.push_str(text);

                    while let Some(newline_index) = buffer.find('\n') {
                        let line = buffer.drain(..=newline_index).collect::<String>();
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        let reply = serde_json::from_str::<OllamaChatReply>(line)
                            .map_err(|err| BackendError::transport(err.to_string()))?;
                        yield reply;
                    }
                }
            };

            Ok(Box::pin(stream) as OllamaChunkStream<'a>)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaChatPayload {
    pub model: String,
    pub messages: Vec<OllamaWireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OllamaWireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaWireOptions>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaWireMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaWireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<Message> for OllamaWireMessage {
    fn from(message: Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|tool_call| OllamaWireToolCall {
                function: OllamaWireFunctionCall {
                    name: tool_call.name,
                    arguments: arguments_value(&tool_call.arguments),
                },
            })
            .collect();

        Self {
            role: role.to_string(),
            content: message.content,
            tool_calls,
            tool_call_id: message.tool_call_id,
        }
    }
}

// Arguments travel as a JSON object on the wire. A string that fails to
// parse came from somewhere other than a model response; forward it as-is
// rather than dropping the call.
fn arguments_value(arguments: &str) -> Value {
    serde_json::from_str::<Value>(arguments)
        .unwrap_or_else(|_| Value::String(arguments.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaWireTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OllamaWireToolFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaWireToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaWireToolCall {
    pub function: OllamaWireFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaWireFunctionCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaWireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OllamaChatReply {
    pub model: String,
    pub message: OllamaReplyMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OllamaReplyMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<OllamaWireToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorReply {
    error: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsReply {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::{ToolDefinition, ToolResult};

    struct FakeTransport {
        captured: Mutex<Option<OllamaChatPayload>>,
        reply: OllamaChatReply,
        chunks: Vec<OllamaChatReply>,
    }

    impl FakeTransport {
        fn new(reply: OllamaChatReply) -> Self {
            Self {
                captured: Mutex::new(None),
                reply,
                chunks: Vec::new(),
            }
        }

        fn with_chunks(mut self, chunks: Vec<OllamaChatReply>) -> Self {
            self.chunks = chunks;
            self
        }
    }

    impl OllamaTransport for FakeTransport {
        fn chat<'a>(
            &'a self,
            payload: OllamaChatPayload,
        ) -> BackendFuture<'a, Result<OllamaChatReply, BackendError>> {
            Box::pin(async move {
                *self.captured.lock().expect("payload lock") = Some(payload);
                Ok(self.reply.clone())
            })
        }

        fn chat_stream<'a>(
            &'a self,
            payload: OllamaChatPayload,
        ) -> BackendFuture<'a, Result<OllamaChunkStream<'a>, BackendError>> {
            Box::pin(async move {
                *self.captured.lock().expect("payload lock") = Some(payload);
                let chunks = self.chunks.clone();
                let stream = futures_util::stream::iter(
                    chunks.into_iter().map(Ok::<OllamaChatReply, BackendError>),
                );
                Ok(Box::pin(stream) as OllamaChunkStream<'a>)
            })
        }
    }

    fn tool_reply() -> OllamaChatReply {
        OllamaChatReply {
            model: "llama3.2".to_string(),
            message: OllamaReplyMessage {
                content: String::new(),
                tool_calls: vec![
                    OllamaWireToolCall {
                        function: OllamaWireFunctionCall {
                            name: "list_directory".to_string(),
                            arguments: json!({}),
                        },
                    },
                    OllamaWireToolCall {
                        function: OllamaWireFunctionCall {
                            name: "read_file_contents".to_string(),
                            arguments: json!({"file_path": "requirements.txt"}),
                        },
                    },
                ],
            },
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: Some(20),
            eval_count: Some(8),
        }
    }

    #[tokio::test]
    async fn complete_synthesizes_correlation_ids_in_call_order() {
        let transport = Arc::new(FakeTransport::new(tool_reply()));
        let backend = OllamaBackend::new(transport.clone());

        let request = ChatRequest::new("llama3.2", vec![Message::user("list and read")])
            .with_tools(vec![ToolDefinition {
                name: "list_directory".to_string(),
                description: "Lists files".to_string(),
                parameters: "{\"type\":\"object\",\"properties\":{}}".to_string(),
            }]);

        let response = backend.complete(request).await.expect("complete should map");

        assert_eq!(response.backend, BackendKind::Ollama);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "call_0");
        assert_eq!(response.tool_calls[1].id, "call_1");
        assert_eq!(
            response.tool_calls[1].arguments,
            "{\"file_path\":\"requirements.txt\"}"
        );
        assert_eq!(response.usage.total_tokens, 28);

        let payload = transport
            .captured
            .lock()
            .expect("payload lock")
            .clone()
            .expect("payload should be captured");
        assert!(!payload.stream);
        assert_eq!(payload.tools.len(), 1);
        assert_eq!(payload.tools[0].kind, "function");
    }

    #[tokio::test]
    async fn tool_result_messages_keep_correlation_id_on_the_wire() {
        let reply = OllamaChatReply {
            model: "llama3.2".to_string(),
            message: OllamaReplyMessage {
                content: "done".to_string(),
                tool_calls: Vec::new(),
            },
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: None,
            eval_count: None,
        };
        let transport = Arc::new(FakeTransport::new(reply));
        let backend = OllamaBackend::new(transport.clone());

        let messages = vec![
            Message::user("go"),
            Message::assistant_tool_calls(vec![ToolCall {
                id: "call_0".to_string(),
                name: "list_directory".to_string(),
                arguments: "{}".to_string(),
            }]),
            Message::tool_result(ToolResult {
                tool_call_id: "call_0".to_string(),
                output: "README.md, Cargo.toml".to_string(),
            }),
        ];

        backend
            .complete(ChatRequest::new("llama3.2", messages))
            .await
            .expect("complete should succeed");

        let payload = transport
            .captured
            .lock()
            .expect("payload lock")
            .clone()
            .expect("payload should be captured");

        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.messages[1].role, "assistant");
        assert_eq!(payload.messages[1].tool_calls.len(), 1);
        assert_eq!(payload.messages[2].role, "tool");
        assert_eq!(payload.messages[2].tool_call_id.as_deref(), Some("call_0"));
    }

    #[tokio::test]
    async fn invalid_tool_schema_is_rejected_before_any_request() {
        let transport = Arc::new(FakeTransport::new(tool_reply()));
        let backend = OllamaBackend::new(transport.clone());

        let request = ChatRequest::new("llama3.2", vec![Message::user("hi")]).with_tools(vec![
            ToolDefinition {
                name: "broken".to_string(),
                description: "Bad schema".to_string(),
                parameters: "not json".to_string(),
            },
        ]);

        let error = backend
            .complete(request)
            .await
            .expect_err("schema should fail");
        assert_eq!(error.kind, crate::BackendErrorKind::InvalidRequest);
        assert!(transport.captured.lock().expect("payload lock").is_none());
    }

    #[tokio::test]
    async fn stream_yields_deltas_then_complete_response() {
        let chunks = vec![
            OllamaChatReply {
                model: "llama3.2".to_string(),
                message: OllamaReplyMessage {
                    content: "hello".to_string(),
                    tool_calls: Vec::new(),
                },
                done: false,
                done_reason: None,
                prompt_eval_count: None,
                eval_count: None,
            },
            OllamaChatReply {
                model: "llama3.2".to_string(),
                message: OllamaReplyMessage {
                    content: " world".to_string(),
                    tool_calls: Vec::new(),
                },
                done: false,
                done_reason: None,
                prompt_eval_count: None,
                eval_count: None,
            },
            OllamaChatReply {
                model: "llama3.2".to_string(),
                message: OllamaReplyMessage {
                    content: String::new(),
                    tool_calls: Vec::new(),
                },
                done: true,
                done_reason: Some("stop".to_string()),
                prompt_eval_count: Some(11),
                eval_count: Some(2),
            },
        ];
        let transport = Arc::new(FakeTransport::new(tool_reply()).with_chunks(chunks));
        let backend = OllamaBackend::new(transport);

        let request =
            ChatRequest::new("llama3.2", vec![Message::user("greet")]).enable_streaming();
        let mut stream = backend.stream(request).await.expect("stream should start");

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.expect("event should be ok"));
        }

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::TextDelta("hello".to_string()));
        assert_eq!(events[1], StreamEvent::TextDelta(" world".to_string()));
        match &events[2] {
            StreamEvent::ResponseComplete(response) => {
                assert_eq!(response.content, "hello world");
                assert_eq!(response.stop_reason, StopReason::EndTurn);
                assert_eq!(response.usage.total_tokens, 13);
            }
            other => panic!("expected ResponseComplete, got {other:?}"),
        }
    }

}
