//! Fixed name-to-tool mapping populated at startup.

use std::future::Future;
use std::sync::Arc;

use wbackend::ToolDefinition;
use wcommon::Registry;

use crate::{FunctionTool, Tool, ToolError, ToolExecutionContext};

/// Registered descriptors are immutable for the registry's lifetime; the
/// schemas returned by [`definitions`](ToolRegistry::definitions) are what
/// the backend sees for the whole session.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Registry<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool; a second registration under the same name is rejected.
    pub fn register<T>(&mut self, tool: T) -> Result<(), ToolError>
    where
        T: Tool + 'static,
    {
        let name = tool.definition().name;
        self.tools
            .try_insert(name, Arc::new(tool))
            .map_err(|(name, _)| {
                ToolError::duplicate(format!("tool '{name}' is already registered"))
                    .with_tool_name(name)
            })
    }

    pub fn register_fn<F, Fut>(
        &mut self,
        definition: ToolDefinition,
        handler: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(String, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(definition, handler))
    }

    pub fn register_sync_fn<F>(
        &mut self,
        definition: ToolDefinition,
        handler: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(String, ToolExecutionContext) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.register_fn(definition, move |args_json, context| {
            let output = handler(args_json, context);
            async move { output }
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Schema snapshot handed to the backend, ordered by tool name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self
            .tools
            .values()
            .map(|tool| tool.definition())
            .collect::<Vec<_>>();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolErrorKind;

    fn echo_definition(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "Echoes arguments".to_string(),
            parameters: "{\"type\":\"object\"}".to_string(),
        }
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync_fn(echo_definition("echo"), |args, _ctx| Ok(args))
            .expect("first registration should succeed");

        let error = registry
            .register_sync_fn(echo_definition("echo"), |args, _ctx| Ok(args))
            .expect_err("duplicate registration should fail");

        assert_eq!(error.kind, ToolErrorKind::Duplicate);
        assert_eq!(error.tool_name.as_deref(), Some("echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync_fn(echo_definition("zeta"), |args, _ctx| Ok(args))
            .expect("register zeta");
        registry
            .register_sync_fn(echo_definition("alpha"), |args, _ctx| Ok(args))
            .expect("register alpha");

        let names = registry
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn lookup_and_removal_round_trip() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry
            .register_sync_fn(echo_definition("echo"), |args, _ctx| Ok(args))
            .expect("registration should succeed");
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());

        let removed = registry.remove("echo");
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }
}
