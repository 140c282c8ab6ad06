//! The tool-augmented chat loop.
//!
//! One turn alternates between exactly two states: awaiting a backend
//! response and awaiting tool results. Tool failures of any kind are fed
//! back to the model as error results; only pre-loop validation and store
//! faults surface as `Err` to the caller.

use std::sync::Arc;

use async_stream::stream;
use futures_util::StreamExt;
use wbackend::{
    ChatBackend, ChatRequest, ChatResponse, Message, StopReason, StreamEvent, TokenUsage,
    ToolCall, ToolResult,
};
use wtooling::{ToolError, ToolExecutionContext, ToolRuntime};

use crate::{
    ChatError, ChatEvent, ChatEventStream, ChatLoopHooks, ChatTurnRequest, ChatTurnResult,
    ConversationStore, InMemoryConversationStore, NoopChatLoopHooks, TurnTermination,
};

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 3;

/// Answer surfaced when the round bound is hit with no assistant text.
pub const TOOL_ROUND_LIMIT_ANSWER: &str = "tool round limit reached before a final answer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatPolicy {
    /// Upper bound on backend requests per turn, counting the final one.
    pub max_tool_rounds: u32,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl ChatPolicy {
    pub fn new(max_tool_rounds: u32) -> Self {
        Self {
            max_tool_rounds: max_tool_rounds.max(1),
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn ConversationStore>,
    tool_runtime: Option<Arc<dyn ToolRuntime>>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatLoopHooks>,
}

pub struct ChatServiceBuilder {
    backend: Arc<dyn ChatBackend>,
    store: Option<Arc<dyn ConversationStore>>,
    tool_runtime: Option<Arc<dyn ToolRuntime>>,
    policy: ChatPolicy,
    hooks: Option<Arc<dyn ChatLoopHooks>>,
}

impl ChatServiceBuilder {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            store: None,
            tool_runtime: None,
            policy: ChatPolicy::default(),
            hooks: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn tool_runtime(mut self, tool_runtime: Arc<dyn ToolRuntime>) -> Self {
        self.tool_runtime = Some(tool_runtime);
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.policy = ChatPolicy::new(max_tool_rounds);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatLoopHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> ChatService {
        ChatService {
            backend: self.backend,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryConversationStore::new())),
            tool_runtime: self.tool_runtime,
            policy: self.policy,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopChatLoopHooks)),
        }
    }
}

impl ChatService {
    pub fn builder(backend: Arc<dyn ChatBackend>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(backend)
    }

    pub fn new(backend: Arc<dyn ChatBackend>, store: Arc<dyn ConversationStore>) -> Self {
        Self::builder(backend).store(store).build()
    }

    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        if request.stream {
            return Err(ChatError::invalid_request(
                "use stream_turn for streaming requests",
            ));
        }

        let mut turn = self.prepare_turn(request).await?;
        let mut usage = TokenUsage::default();
        let mut rounds = 0_u32;

        let (answer, termination, stop_reason) = loop {
            rounds += 1;
            self.hooks.on_round_start(&turn.session.id, rounds);

            let round_request = self.build_round_request(&turn, false)?;
            let response = match self.backend.complete(round_request).await {
                Ok(response) => response,
                Err(error) => {
                    break (
                        error.to_string(),
                        TurnTermination::BackendFailure,
                        StopReason::Other,
                    );
                }
            };

            usage.accumulate(response.usage);

            if !response.has_tool_calls() {
                turn.push(Message::assistant(response.content.clone()));
                break (
                    response.content,
                    TurnTermination::Completed,
                    response.stop_reason,
                );
            }

            turn.push(tool_call_declaration(&response));

            for tool_call in &response.tool_calls {
                self.hooks.on_tool_dispatch(&turn.session.id, tool_call);
                let tool_result = self.execute_tool_call(&turn.session.id, tool_call).await;
                turn.push(Message::tool_result(tool_result));
            }

            if rounds >= self.policy.max_tool_rounds {
                break (
                    limit_answer(&response),
                    TurnTermination::ToolRoundLimit,
                    response.stop_reason,
                );
            }
        };

        self.store
            .append_messages(&turn.session.id, turn.new_messages.clone())
            .await?;

        let result = ChatTurnResult {
            session_id: turn.session.id.clone(),
            answer,
            transcript: turn.conversation,
            rounds,
            termination,
            stop_reason,
            usage,
        };

        self.hooks.on_turn_complete(&result);
        Ok(result)
    }

    pub async fn stream_turn<'a>(
        &'a self,
        request: ChatTurnRequest,
    ) -> Result<ChatEventStream<'a>, ChatError> {
        let mut turn = self.prepare_turn(request).await?;

        let stream = stream! {
            let mut usage = TokenUsage::default();
            let mut rounds = 0_u32;

            let (answer, termination, stop_reason) = loop {
                rounds += 1;
                self.hooks.on_round_start(&turn.session.id, rounds);

                let round_request = match self.build_round_request(&turn, true) {
                    Ok(round_request) => round_request,
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                };

                let mut backend_stream = match self.backend.stream(round_request).await {
                    Ok(backend_stream) => backend_stream,
                    Err(error) => {
                        break (
                            error.to_string(),
                            TurnTermination::BackendFailure,
                            StopReason::Other,
                        );
                    }
                };

                let mut streamed_text = String::new();
                let mut final_response = None::<ChatResponse>;
                let mut round_failure = None;

                while let Some(event) = backend_stream.next().await {
                    match event {
                        Ok(StreamEvent::TextDelta(delta)) => {
                            streamed_text.push_str(&delta);
                            yield Ok(ChatEvent::TextDelta(delta));
                        }
                        // Partial fragments; the definitive call list
                        // arrives with the completed response.
                        Ok(StreamEvent::ToolCallDelta(_)) => {}
                        Ok(StreamEvent::ResponseComplete(response)) => {
                            final_response = Some(response);
                        }
                        Err(error) => {
                            round_failure = Some(error);
                            break;
                        }
                    }
                }

                if let Some(error) = round_failure {
                    break (
                        error.to_string(),
                        TurnTermination::BackendFailure,
                        StopReason::Other,
                    );
                }

                let response = final_response.unwrap_or_else(|| ChatResponse {
                    backend: self.backend.kind(),
                    model: turn.session.model.clone(),
                    content: streamed_text.clone(),
                    tool_calls: Vec::new(),
                    stop_reason: StopReason::Other,
                    usage: TokenUsage::default(),
                });

                usage.accumulate(response.usage);

                if !response.has_tool_calls() {
                    turn.push(Message::assistant(response.content.clone()));
                    break (
                        response.content,
                        TurnTermination::Completed,
                        response.stop_reason,
                    );
                }

                turn.push(tool_call_declaration(&response));

                for tool_call in &response.tool_calls {
                    self.hooks.on_tool_dispatch(&turn.session.id, tool_call);
                    yield Ok(ChatEvent::ToolCallRequested(tool_call.clone()));

                    let tool_result = self.execute_tool_call(&turn.session.id, tool_call).await;
                    yield Ok(ChatEvent::ToolResultRecorded(tool_result.clone()));
                    turn.push(Message::tool_result(tool_result));
                }

                if rounds >= self.policy.max_tool_rounds {
                    break (
                        limit_answer(&response),
                        TurnTermination::ToolRoundLimit,
                        response.stop_reason,
                    );
                }
            };

            if let Err(error) = self
                .store
                .append_messages(&turn.session.id, turn.new_messages.clone())
                .await
            {
                yield Err(error);
                return;
            }

            let result = ChatTurnResult {
                session_id: turn.session.id.clone(),
                answer,
                transcript: turn.conversation,
                rounds,
                termination,
                stop_reason,
                usage,
            };

            self.hooks.on_turn_complete(&result);
            yield Ok(ChatEvent::TurnComplete(result));
        };

        Ok(Box::pin(stream))
    }

    async fn prepare_turn(&self, request: ChatTurnRequest) -> Result<TurnState, ChatError> {
        if request.user_input.trim().is_empty() {
            return Err(ChatError::invalid_request("user_input must not be empty"));
        }

        let ChatTurnRequest {
            session,
            user_input,
            temperature,
            max_tokens,
            stream: _,
        } = request;

        let prior = self.store.load_messages(&session.id).await?;
        let user_message = Message::user(user_input);

        // The system prompt is prepended per turn and never persisted.
        let mut conversation = Vec::new();
        if let Some(system_prompt) = &session.system_prompt {
            conversation.push(Message::system(system_prompt.clone()));
        }

        conversation.extend(prior);
        conversation.push(user_message.clone());

        Ok(TurnState {
            session,
            temperature,
            max_tokens,
            conversation,
            new_messages: vec![user_message],
        })
    }

    fn build_round_request(
        &self,
        turn: &TurnState,
        stream: bool,
    ) -> Result<ChatRequest, ChatError> {
        let tools = self
            .tool_runtime
            .as_ref()
            .map(|runtime| runtime.definitions())
            .unwrap_or_default();

        let mut builder = ChatRequest::builder(turn.session.model.clone())
            .messages(turn.conversation.clone())
            .tools(tools)
            .streaming(stream);

        if let Some(temperature) = turn.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = turn.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder
            .build()
            .map_err(|error| ChatError::invalid_request(error.message))
    }

    /// Runs one tool call with full error containment: whatever goes wrong
    /// comes back as an error-carrying result under the original call id.
    async fn execute_tool_call(&self, session_id: &str, tool_call: &ToolCall) -> ToolResult {
        let outcome = match &self.tool_runtime {
            Some(runtime) => {
                runtime
                    .execute(tool_call.clone(), ToolExecutionContext::new(session_id))
                    .await
            }
            None => Err(ToolError::not_found(format!(
                "tool '{}' is not registered",
                tool_call.name
            ))
            .with_tool_name(tool_call.name.clone())
            .with_tool_call_id(tool_call.id.clone())),
        };

        match outcome {
            Ok(result) => result.into_tool_result(),
            Err(error) => ToolResult {
                tool_call_id: tool_call.id.clone(),
                output: format!("tool error: {error}"),
            },
        }
    }
}

struct TurnState {
    session: crate::ChatSession,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    conversation: Vec<Message>,
    new_messages: Vec<Message>,
}

impl TurnState {
    fn push(&mut self, message: Message) {
        self.conversation.push(message.clone());
        self.new_messages.push(message);
    }
}

fn tool_call_declaration(response: &ChatResponse) -> Message {
    let mut declaration = Message::assistant_tool_calls(response.tool_calls.clone());
    declaration.content = response.content.clone();
    declaration
}

fn limit_answer(response: &ChatResponse) -> String {
    if response.content.trim().is_empty() {
        TOOL_ROUND_LIMIT_ANSWER.to_string()
    } else {
        response.content.clone()
    }
}
