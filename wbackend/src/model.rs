//! Backend-agnostic conversation, request, and response model types.
//!
//! ```rust
//! use wbackend::{BackendErrorKind, ChatRequest, Message};
//!
//! let ok = ChatRequest::new_validated(
//!     "llama3.2",
//!     vec![Message::user("List files, then summarize them")],
//! );
//! assert!(ok.is_ok());
//!
//! let err = ChatRequest::new_validated("", vec![Message::user("hi")])
//!     .err()
//!     .expect("empty model should fail");
//! assert_eq!(err.kind, BackendErrorKind::InvalidRequest);
//! ```

use std::fmt::{Display, Formatter};

use wcommon::{GenerationOptions, MetadataMap};

use crate::{BackendError, BackendErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Ollama,
    OpenAiCompatible,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Ollama => "ollama",
            Self::OpenAiCompatible => "openai-compat",
        };

        f.write_str(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn in a conversation.
///
/// `content` may be empty on assistant messages that only record requested
/// tool calls; `tool_call_id` is set on tool-role messages and carries the
/// correlation identifier of the call being answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message that declares tool usage for the given calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-role message carrying one result back to the backend.
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.output,
            tool_calls: Vec::new(),
            tool_call_id: Some(result.tool_call_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema string forwarded to the backend verbatim.
    pub parameters: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Correlation identifier; round-trips unchanged into the matching result.
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Assistant reply for one backend round: text and/or requested tool calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub backend: BackendKind,
    pub model: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
    pub tools: Vec<ToolDefinition>,
    pub metadata: MetadataMap,
}

impl ChatRequest {
    pub fn builder(model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder::new(model)
    }

    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: GenerationOptions::default(),
            tools: Vec::new(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn new_validated(
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<Self, BackendError> {
        let request = Self::new(model, messages);
        request.validate()?;
        Ok(request)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn enable_streaming(mut self) -> Self {
        self.options.stream = true;
        self
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.model.trim().is_empty() {
            return Err(BackendError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(BackendError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(max_tokens) = self.options.max_tokens
            && max_tokens == 0
        {
            return Err(BackendError::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(BackendError::new(
                BackendErrorKind::InvalidRequest,
                "temperature must be in the inclusive range 0.0..=2.0",
                false,
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequestBuilder {
    model: String,
    messages: Vec<Message>,
    options: GenerationOptions,
    tools: Vec<ToolDefinition>,
    metadata: MetadataMap,
}

impl ChatRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            options: GenerationOptions::default(),
            tools: Vec::new(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.options.stream = stream;
        self
    }

    pub fn enable_streaming(self) -> Self {
        self.streaming(true)
    }

    pub fn build(self) -> Result<ChatRequest, BackendError> {
        let request = ChatRequest {
            model: self.model,
            messages: self.messages,
            options: self.options,
            tools: self.tools,
            metadata: self.metadata,
        };

        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_display_is_stable() {
        assert_eq!(BackendKind::Ollama.to_string(), "ollama");
        assert_eq!(BackendKind::OpenAiCompatible.to_string(), "openai-compat");
    }

    #[test]
    fn message_constructors_fill_expected_fields() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert!(user.tool_calls.is_empty());
        assert!(user.tool_call_id.is_none());

        let call = ToolCall {
            id: "call_0".to_string(),
            name: "list_directory".to_string(),
            arguments: "{}".to_string(),
        };
        let declaration = Message::assistant_tool_calls(vec![call.clone()]);
        assert_eq!(declaration.role, Role::Assistant);
        assert!(declaration.content.is_empty());
        assert_eq!(declaration.tool_calls, vec![call]);

        let result = Message::tool_result(ToolResult {
            tool_call_id: "call_0".to_string(),
            output: "README.md".to_string(),
        });
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(result.content, "README.md");
    }

    #[test]
    fn chat_request_validate_enforces_contract() {
        let empty_model = ChatRequest::new("   ", vec![Message::user("hi")]);
        let err = empty_model.validate().expect_err("empty model must fail");
        assert_eq!(err.kind, BackendErrorKind::InvalidRequest);

        let empty_messages = ChatRequest::new("llama3.2", Vec::new());
        let err = empty_messages
            .validate()
            .expect_err("empty messages must fail");
        assert_eq!(err.kind, BackendErrorKind::InvalidRequest);

        let bad_temperature =
            ChatRequest::new("llama3.2", vec![Message::user("hi")]).with_temperature(2.5);
        let err = bad_temperature
            .validate()
            .expect_err("temperature outside range must fail");
        assert_eq!(err.kind, BackendErrorKind::InvalidRequest);

        let bad_max_tokens =
            ChatRequest::new("llama3.2", vec![Message::user("hi")]).with_max_tokens(0);
        let err = bad_max_tokens.validate().expect_err("max_tokens=0 must fail");
        assert_eq!(err.kind, BackendErrorKind::InvalidRequest);

        let valid = ChatRequest::new("llama3.2", vec![Message::user("hi")])
            .with_temperature(0.4)
            .with_max_tokens(128)
            .with_metadata("trace_id", "abc")
            .enable_streaming();
        assert!(valid.validate().is_ok());
        assert!(valid.options.stream);
        assert_eq!(valid.metadata.get("trace_id"), Some(&"abc".to_string()));
    }

    #[test]
    fn chat_request_builder_collects_messages_in_order() {
        let request = ChatRequest::builder("llama3.2")
            .message(Message::system("be concise"))
            .messages(vec![Message::user("first"), Message::user("second")])
            .temperature(0.3)
            .build()
            .expect("request should validate");

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[2].content, "second");
        assert_eq!(request.options.temperature, Some(0.3));
    }

    #[test]
    fn token_usage_accumulates_across_rounds() {
        let mut usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        };
        usage.accumulate(TokenUsage {
            input_tokens: 7,
            output_tokens: 3,
            total_tokens: 10,
        });

        assert_eq!(usage.input_tokens, 17);
        assert_eq!(usage.output_tokens, 8);
        assert_eq!(usage.total_tokens, 25);
    }
}
