//! OpenAI-compatible chat backend (`/chat/completions`, SSE streaming).
//!
//! Covers hosted endpoints as well as Ollama's `/v1` compatibility surface.

use std::collections::BTreeMap;
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
    ChatResponse, Message, Role, SecretString, StopReason, StreamEvent, TokenUsage, ToolCall,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_COMPAT_BASE_URL: &str = "http://localhost:11434/v1";

/// Stream of raw SSE `data:` payloads, one JSON document per item.
pub type SsePayloadStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send + 'a>>;

pub trait OpenAiCompatTransport: Send + Sync {
    fn complete<'a>(
        &'a self,
        payload: OpenAiCompatPayload,
        auth: SecretString,
    ) -> BackendFuture<'a, Result<OpenAiCompatReply, BackendError>>;

    fn stream<'a>(
        &'a self,
        payload: OpenAiCompatPayload,
        auth: SecretString,
    ) -> BackendFuture<'a, Result<SsePayloadStream<'a>, BackendError>>;
}

#[derive(Clone)]
pub struct OpenAiCompatBackend {
    transport: Arc<dyn OpenAiCompatTransport>,
    api_key: Option<SecretString>,
    fallback_model: String,
}

impl OpenAiCompatBackend {
    pub fn new(transport: Arc<dyn OpenAiCompatTransport>) -> Self {
        Self {
            transport,
            api_key: None,
            fallback_model: "gpt-4o-mini".to_string(),
        }
    }

    /// Backend for a local Ollama daemon through its `/v1` surface. The
    /// daemon ignores the key value but the header must be present.
    pub fn ollama_local(client: Client) -> Self {
        Self::new(Arc::new(
            OpenAiCompatHttpTransport::new(client).with_base_url(OLLAMA_COMPAT_BASE_URL),
        ))
        .with_api_key(SecretString::new("ollama"))
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    fn resolve_auth(&self) -> Result<SecretString, BackendError> {
        self.api_key.clone().ok_or_else(|| {
            BackendError::authentication("no API key configured for openai-compatible backend")
        })
    }

    fn build_payload(
        &self,
        request: ChatRequest,
        stream: bool,
    ) -> Result<OpenAiCompatPayload, BackendError> {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.clone()
        } else {
            request.model
        };

        let messages = request
            .messages
            .into_iter()
            .map(OpenAiCompatWireMessage::from)
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

                Ok(OpenAiCompatWireTool {
                    kind: "function".to_string(),
                    function: OpenAiCompatWireToolFunction {
                        name: tool.name,
                        description: tool.description,
                        parameters,
                    },
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(OpenAiCompatPayload {
            model,
            messages,
            tools,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream,
        })
    }
}

impl ChatBackend for OpenAiCompatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenAiCompatible
    }

    fn complete<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<ChatResponse, BackendError>> {
        Box::pin(async move {
            request.validate()?;
            let auth = self.resolve_auth()?;
            let payload = self.build_payload(request, false)?;
            let reply = self.transport.complete(payload, auth).await?;
            map_reply(reply)
        })
    }

    fn stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> BackendFuture<'a, Result<BoxedEventStream<'a>, BackendError>> {
        Box::pin(async move {
            request.validate()?;
            let auth = self.resolve_auth()?;
            let fallback_model = if request.model.trim().is_empty() {
                self.fallback_model.clone()
            } else {
                request.model.clone()
            };
            let payload = self.build_payload(request, true)?;
            let mut payloads = self.transport.stream(payload, auth).await?;

            let stream = try_stream! {
                let mut content = String::new();
                let mut partial_calls: BTreeMap<u32, ToolCall> = BTreeMap::new();
                let mut model = None::<String>;
                let mut finish_reason = None::<String>;

                while let Some(item) = payloads.next().await {
                    let payload = item?;
                    let parsed = serde_json::from_str::<OpenAiCompatStreamReply>(&payload)
                        .map_err(|err| BackendError::transport(err.to_string()))?;

                    if model.is_none() {
                        model = Some(parsed.model.clone());
                    }

                    let Some(choice) = parsed.choices.first() else {
                        continue;
                    };

                    if let Some(delta_content) = &choice.delta.content
                        && !delta_content.is_empty()
                    {
                        content.push_str(delta_content);
                        yield StreamEvent::TextDelta(delta_content.clone());
                    }

                    for delta_call in choice.delta.tool_calls.iter().flatten() {
                        let index = delta_call.index.unwrap_or(0);
                        let entry = partial_calls.entry(index).or_insert_with(|| ToolCall {
                            id: delta_call
                                .id
                                .clone()
                                .unwrap_or_else(|| format!("call_{index}")),
                            name: String::new(),
                            arguments: String::new(),
                        });

                        if let Some(id) = &delta_call.id {
                            entry.id = id.clone();
                        }

                        if let Some(function) = &delta_call.function {
                            if let Some(name) = &function.name {
                                entry.name = name.clone();
                            }

                            if let Some(arguments) = &function.arguments {
                                entry.arguments.push_str(arguments);
                            }
                        }

                        yield StreamEvent::ToolCallDelta(entry.clone());
                    }

                    if choice.finish_reason.is_some() {
                        finish_reason = choice.finish_reason.clone();
                    }
                }

                let tool_calls = partial_calls.into_values().collect::<Vec<_>>();
                let stop_reason =
                    parse_finish_reason(finish_reason.as_deref(), !tool_calls.is_empty());

                yield StreamEvent::ResponseComplete(ChatResponse {
                    backend: BackendKind::OpenAiCompatible,
                    model: model.unwrap_or(fallback_model),
                    content,
                    tool_calls,
                    stop_reason,
                    // Usage is not reported on the compat streaming path.
                    usage: TokenUsage::default(),
                });
            };

            Ok(Box::pin(stream) as BoxedEventStream<'a>)
        })
    }
}

fn map_reply(reply: OpenAiCompatReply) -> Result<ChatResponse, BackendError> {
    let choice = reply
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::transport("response did not include choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect::<Vec<_>>();

    let stop_reason = parse_finish_reason(choice.finish_reason.as_deref(), !tool_calls.is_empty());
    let usage = reply.usage.map(TokenUsage::from).unwrap_or_default();

    Ok(ChatResponse {
        backend: BackendKind::OpenAiCompatible,
        model: reply.model,
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        stop_reason,
        usage,
    })
}

fn parse_finish_reason(finish_reason: Option<&str>, has_tool_calls: bool) -> StopReason {
    match finish_reason {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        _ if has_tool_calls => StopReason::ToolUse,
        _ => StopReason::Other,
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiCompatHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
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
        let message = serde_json::from_str::<OpenAiCompatErrorEnvelope>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| format!("http {status}: {}", truncate_body(&body, 4096)));

        classify_status(status, message)
    }
}

impl OpenAiCompatTransport for OpenAiCompatHttpTransport {
    fn complete<'a>(
        &'a self,
        payload: OpenAiCompatPayload,
        auth: SecretString,
    ) -> BackendFuture<'a, Result<OpenAiCompatReply, BackendError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("chat/completions"))
                .bearer_auth(auth.expose())
                .json(&payload)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            response
                .json::<OpenAiCompatReply>()
                .await
                .map_err(|err| BackendError::transport(err.to_string()))
        })
    }

    fn stream<'a>(
        &'a self,
        mut payload: OpenAiCompatPayload,
        auth: SecretString,
    ) -> BackendFuture<'a, Result<SsePayloadStream<'a>, BackendError>> {
        Box::pin(async move {
            payload.stream = true;
            let response = self
                .client
                .post(self.endpoint("chat/completions"))
                .bearer_auth(auth.expose())
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

                'outer: while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(classify_reqwest_error)?;
                    let text = std::str::from_utf8(&chunk)
                        .map_err(|err| BackendError::transport(err.to_string()))?;
                    buffer.push_str(text);

                    while let Some(newline_index) = buffer.find('\n') {
                        let line = buffer.drain(..=newline_index).collect::<String>();
                        let line = line.trim();

                        let Some(payload) = line.strip_prefix("data:") else {
                            continue;
                        };

                        let payload = payload.trim();
                        if payload == "[DONE]" {
                            break 'outer;
                        }

                        yield payload.to_string();
                    }
                }
            };

            Ok(Box::pin(stream) as SsePayloadStream<'a>)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatPayload {
    pub model: String,
    pub messages: Vec<OpenAiCompatWireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OpenAiCompatWireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatWireMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OpenAiCompatWireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<Message> for OpenAiCompatWireMessage {
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
            .map(|tool_call| OpenAiCompatWireToolCall {
                id: tool_call.id,
                kind: "function".to_string(),
                function: OpenAiCompatWireFunctionCall {
                    name: tool_call.name,
                    arguments: tool_call.arguments,
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

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatWireTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OpenAiCompatWireToolFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatWireToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatWireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OpenAiCompatWireFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiCompatWireFunctionCall {
    pub name: String,
    /// JSON-encoded argument object; the compat wire keeps it as a string.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiCompatReply {
    pub model: String,
    pub choices: Vec<OpenAiCompatReplyChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiCompatUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiCompatReplyChoice {
    pub message: OpenAiCompatReplyMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiCompatReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiCompatReplyToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiCompatReplyToolCall {
    pub id: String,
    pub function: OpenAiCompatReplyFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiCompatReplyFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OpenAiCompatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<OpenAiCompatUsage> for TokenUsage {
    fn from(usage: OpenAiCompatUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatErrorEnvelope {
    error: OpenAiCompatErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatStreamReply {
    model: String,
    choices: Vec<OpenAiCompatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatStreamChoice {
    delta: OpenAiCompatStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiCompatStreamDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatStreamDeltaToolCall {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiCompatStreamDeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatStreamDeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::ToolDefinition;

    #[derive(Default)]
    struct FakeTransport {
        captured_payload: Mutex<Option<OpenAiCompatPayload>>,
        captured_auth: Mutex<Option<String>>,
        reply: Mutex<Option<OpenAiCompatReply>>,
        sse_payloads: Mutex<Vec<String>>,
    }

    impl OpenAiCompatTransport for FakeTransport {
        fn complete<'a>(
            &'a self,
            payload: OpenAiCompatPayload,
            auth: SecretString,
        ) -> BackendFuture<'a, Result<OpenAiCompatReply, BackendError>> {
            Box::pin(async move {
                *self.captured_payload.lock().expect("payload lock") = Some(payload);
                *self.captured_auth.lock().expect("auth lock") = Some(auth.expose().to_string());
                Ok(self
                    .reply
                    .lock()
                    .expect("reply lock")
                    .clone()
                    .expect("reply should be configured"))
            })
        }

        fn stream<'a>(
            &'a self,
            payload: OpenAiCompatPayload,
            auth: SecretString,
        ) -> BackendFuture<'a, Result<SsePayloadStream<'a>, BackendError>> {
            Box::pin(async move {
                *self.captured_payload.lock().expect("payload lock") = Some(payload);
                *self.captured_auth.lock().expect("auth lock") = Some(auth.expose().to_string());
                let payloads = self.sse_payloads.lock().expect("sse lock").clone();
                let stream = futures_util::stream::iter(
                    payloads.into_iter().map(Ok::<String, BackendError>),
                );
                Ok(Box::pin(stream) as SsePayloadStream<'a>)
            })
        }
    }

    fn reply_with_tool_call() -> OpenAiCompatReply {
        OpenAiCompatReply {
            model: "qwen2.5:7b".to_string(),
            choices: vec![OpenAiCompatReplyChoice {
                message: OpenAiCompatReplyMessage {
                    content: Some(String::new()),
                    tool_calls: Some(vec![OpenAiCompatReplyToolCall {
                        id: "call_abc".to_string(),
                        function: OpenAiCompatReplyFunctionCall {
                            name: "read_file_contents".to_string(),
                            arguments: "{\"file_path\":\"data/economics.txt\"}".to_string(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: Some(OpenAiCompatUsage {
                prompt_tokens: 30,
                completion_tokens: 12,
                total_tokens: 42,
            }),
        }
    }

    #[tokio::test]
    async fn complete_maps_reply_and_sends_bearer_auth() {
        let transport = Arc::new(FakeTransport::default());
        *transport.reply.lock().expect("reply lock") = Some(reply_with_tool_call());

        let backend = OpenAiCompatBackend::new(transport.clone())
            .with_api_key(SecretString::new("sk-test-1"));

        let request = ChatRequest::new("qwen2.5:7b", vec![Message::user("read the file")])
            .with_tools(vec![ToolDefinition {
                name: "read_file_contents".to_string(),
                description: "Reads a file".to_string(),
                parameters: json!({"type": "object"}).to_string(),
            }]);

        let response = backend.complete(request).await.expect("complete should map");

        assert_eq!(response.backend, BackendKind::OpenAiCompatible);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_abc");
        assert_eq!(response.usage.total_tokens, 42);

        let auth = transport.captured_auth.lock().expect("auth lock").clone();
        assert_eq!(auth.as_deref(), Some("sk-test-1"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let transport = Arc::new(FakeTransport::default());
        let backend = OpenAiCompatBackend::new(transport.clone());

        let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        let error = backend
            .complete(request)
            .await
            .expect_err("missing key should fail");

        assert_eq!(error.kind, crate::BackendErrorKind::Authentication);
        assert!(
            transport
                .captured_payload
                .lock()
                .expect("payload lock")
                .is_none()
        );
    }

    #[tokio::test]
    async fn stream_accumulates_tool_call_fragments() {
        let transport = Arc::new(FakeTransport::default());
        *transport.sse_payloads.lock().expect("sse lock") = vec![
            json!({
                "model": "qwen2.5:7b",
                "choices": [{"delta": {"content": "Looking"}, "finish_reason": null}]
            })
            .to_string(),
            json!({
                "model": "qwen2.5:7b",
                "choices": [{"delta": {"tool_calls": [
                    {"index": 0, "id": "call_abc", "function": {"name": "read_file_contents", "arguments": "{\"file_"}}
                ]}, "finish_reason": null}]
            })
            .to_string(),
            json!({
                "model": "qwen2.5:7b",
                "choices": [{"delta": {"tool_calls": [
                    {"index": 0, "function": {"arguments": "path\":\"a.txt\"}"}}
                ]}, "finish_reason": "tool_calls"}]
            })
            .to_string(),
        ];

        let backend = OpenAiCompatBackend::new(transport)
            .with_api_key(SecretString::new("sk-test-1"));

        let request =
            ChatRequest::new("qwen2.5:7b", vec![Message::user("read")]).enable_streaming();
        let mut stream = backend.stream(request).await.expect("stream should start");

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.expect("event should be ok"));
        }

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::TextDelta("Looking".to_string()));
        assert!(matches!(events[1], StreamEvent::ToolCallDelta(_)));

        match &events[3] {
            StreamEvent::ResponseComplete(response) => {
                assert_eq!(response.stop_reason, StopReason::ToolUse);
                assert_eq!(response.tool_calls.len(), 1);
                assert_eq!(
                    response.tool_calls[0].arguments,
                    "{\"file_path\":\"a.txt\"}"
                );
            }
            other => panic!("expected ResponseComplete, got {other:?}"),
        }
    }
}
