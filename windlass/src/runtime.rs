//! Facade-owned assembly of a backend, a tool registry, and a chat service.

use std::sync::Arc;
use std::time::Duration;

use wbackend::ChatBackend;
use wchat::{ChatLoopHooks, ChatPolicy, ChatService, ConversationStore};
use wtooling::{RegistryToolRuntime, ToolRegistry, ToolRuntimeHooks};

#[cfg(feature = "backend-ollama")]
use wbackend::adapters::ollama::OllamaBackend;

/// Everything one session driver needs, built once and cloned freely.
#[derive(Clone)]
pub struct LoopBundle {
    pub backend: Arc<dyn ChatBackend>,
    pub tool_runtime: Arc<RegistryToolRuntime>,
    pub chat: ChatService,
}

pub struct LoopBundleBuilder {
    backend: Arc<dyn ChatBackend>,
    registry: ToolRegistry,
    policy: ChatPolicy,
    store: Option<Arc<dyn ConversationStore>>,
    tool_timeout: Option<Duration>,
    tool_hooks: Option<Arc<dyn ToolRuntimeHooks>>,
    loop_hooks: Option<Arc<dyn ChatLoopHooks>>,
}

impl LoopBundleBuilder {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            registry: ToolRegistry::new(),
            policy: ChatPolicy::default(),
            store: None,
            tool_timeout: None,
            tool_hooks: None,
            loop_hooks: None,
        }
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
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

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = Some(tool_timeout);
        self
    }

    pub fn tool_hooks(mut self, tool_hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.tool_hooks = Some(tool_hooks);
        self
    }

    pub fn loop_hooks(mut self, loop_hooks: Arc<dyn ChatLoopHooks>) -> Self {
        self.loop_hooks = Some(loop_hooks);
        self
    }

    pub fn build(self) -> LoopBundle {
        let mut tool_runtime = RegistryToolRuntime::new(Arc::new(self.registry));
        if let Some(tool_timeout) = self.tool_timeout {
            tool_runtime = tool_runtime.with_timeout(tool_timeout);
        }
        if let Some(tool_hooks) = self.tool_hooks {
            tool_runtime = tool_runtime.with_hooks(tool_hooks);
        }
        let tool_runtime = Arc::new(tool_runtime);

        let mut chat_builder = ChatService::builder(Arc::clone(&self.backend))
            .policy(self.policy)
            .tool_runtime(Arc::clone(&tool_runtime) as Arc<dyn wtooling::ToolRuntime>);

        if let Some(store) = self.store {
            chat_builder = chat_builder.store(store);
        }

        if let Some(loop_hooks) = self.loop_hooks {
            chat_builder = chat_builder.hooks(loop_hooks);
        }

        LoopBundle {
            backend: self.backend,
            tool_runtime,
            chat: chat_builder.build(),
        }
    }
}

/// Chat service without tools, for plain question/answer sessions.
pub fn chat_service(backend: Arc<dyn ChatBackend>) -> ChatService {
    ChatService::builder(backend).build()
}

/// Backend talking to a local Ollama daemon at the default address.
///
/// Pass a pre-configured `reqwest::Client` to control timeouts; the chat
/// loop treats request expiry like any other contained backend failure.
#[cfg(feature = "backend-ollama")]
pub fn local_ollama_backend(client: reqwest::Client) -> Arc<dyn ChatBackend> {
    Arc::new(OllamaBackend::local(client))
}

#[cfg(feature = "backend-ollama")]
pub fn local_ollama_bundle(registry: ToolRegistry) -> LoopBundle {
    LoopBundleBuilder::new(local_ollama_backend(reqwest::Client::new()))
        .registry(registry)
        .build()
}
