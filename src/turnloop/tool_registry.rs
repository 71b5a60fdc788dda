//! Uniform tool dispatch.
//!
//! Every capability the model can invoke, whether implemented locally or
//! proxied to a tool server, registers here under a flat name. The registry
//! is the only dispatch path: the turn controller never distinguishes local
//! from remote tools.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Failure reported by a tool implementation.
#[derive(Debug)]
pub enum ToolError {
    /// Arguments missing or of the wrong shape.
    InvalidArguments(String),
    /// The tool ran and failed.
    ExecutionFailed(String),
    /// A proxied tool's backing session is gone.
    SessionClosed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::InvalidArguments(msg) => write!(f, "invalid arguments: {}", msg),
            ToolError::ExecutionFailed(msg) => write!(f, "execution failed: {}", msg),
            ToolError::SessionClosed(msg) => write!(f, "session closed: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// Where a catalog entry comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Implemented in-process.
    Local,
    /// Proxied to the named tool server.
    Server(String),
}

/// Static description of a tool, used to build the system prompt.
#[derive(Clone, Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: Value,
    pub origin: ToolOrigin,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            origin: ToolOrigin::Local,
        }
    }

    pub fn with_origin(mut self, origin: ToolOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// The outcome of one tool invocation, as the model will see it.
#[derive(Clone, Debug)]
pub struct ToolResult {
    pub tool_name: String,
    pub content: String,
    pub success: bool,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: content.into(),
            success: true,
        }
    }

    pub fn failed(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: content.into(),
            success: false,
        }
    }
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool. `args` is always a JSON object.
    async fn invoke(&self, args: Value) -> Result<String, ToolError>;
}

/// Name-keyed collection of tools with collision-safe registration.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, so prompt listings stay stable.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its descriptor name.
    ///
    /// The first registration of a name wins; later registrations under the
    /// same name are dropped with a warning so an external server can never
    /// silently shadow an already-published tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name.clone();
        if self.tools.contains_key(&name) {
            warn!("tool {:?} already registered, keeping the existing one", name);
            return;
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.descriptor().clone())
            .collect()
    }

    /// Dispatch one invocation.
    ///
    /// This is infallible by contract: unknown names and tool failures both
    /// come back as failed [`ToolResult`]s, so the turn loop always has
    /// something to fold into the conversation.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let tool = match self.tools.get(name) {
            Some(t) => t.clone(),
            None => {
                return ToolResult::failed(name, format!("Unknown tool: {}", name));
            }
        };

        debug!("dispatching tool {}", name);
        match tool.invoke(args).await {
            Ok(content) => ToolResult::ok(name, content),
            Err(e) => ToolResult::failed(name, format!("Error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedTool {
        descriptor: ToolDescriptor,
        reply: String,
    }

    impl FixedTool {
        fn new(name: &str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                descriptor: ToolDescriptor::new(name, format!("{} tool", name), json!({})),
                reply: reply.to_string(),
            })
        }
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingTool {
        descriptor: ToolDescriptor,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn unknown_tool_yields_failed_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.content, "Unknown tool: nope");
        assert_eq!(result.tool_name, "nope");
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool::new("echo", "first"));
        registry.register(FixedTool::new("echo", "second"));
        assert_eq!(registry.len(), 1);

        let result = registry.execute("echo", json!({})).await;
        assert!(result.success);
        assert_eq!(result.content, "first");
    }

    #[tokio::test]
    async fn tool_error_becomes_failed_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool {
            descriptor: ToolDescriptor::new("burn", "fails", json!({})),
        }));
        let result = registry.execute("burn", json!({})).await;
        assert!(!result.success);
        assert!(result.content.contains("disk on fire"));
    }

    #[test]
    fn descriptors_default_to_local_origin() {
        let descriptor = ToolDescriptor::new("add", "Add numbers", json!({}));
        assert_eq!(descriptor.origin, ToolOrigin::Local);

        let remote = ToolDescriptor::new("fetch", "Fetch a URL", json!({}))
            .with_origin(ToolOrigin::Server("web".into()));
        assert_eq!(remote.origin, ToolOrigin::Server("web".into()));
    }

    #[test]
    fn descriptors_preserve_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool::new("b", ""));
        registry.register(FixedTool::new("a", ""));
        registry.register(FixedTool::new("c", ""));
        let names: Vec<_> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
