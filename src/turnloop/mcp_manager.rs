//! Connection lifecycle across every configured tool server, and the adapter
//! that makes a remote tool indistinguishable from a local one.

use crate::turnloop::config::McpConfig;
use crate::turnloop::mcp_session::{McpError, McpSession};
use crate::turnloop::tool_registry::{Tool, ToolDescriptor, ToolError, ToolOrigin, ToolRegistry};
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

/// Owns every live server session, in the order they were established.
#[derive(Default)]
pub struct McpManager {
    sessions: Vec<Arc<McpSession>>,
}

impl McpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to every configured server concurrently.
    ///
    /// Servers fail independently: one refusing to start, crashing during
    /// the handshake or timing out never blocks the others. Failures are
    /// logged and the names returned, so a caller can surface them.
    ///
    /// Connecting is idempotent per name: a server that already has a live
    /// session is left alone, so re-running after a config change only
    /// spawns the new entries.
    pub async fn connect_all(&mut self, config: &McpConfig) -> Vec<String> {
        let attempts = config
            .servers
            .iter()
            .filter(|(name, _)| {
                if self.is_connected(name) {
                    debug!("{} already connected, skipping", name);
                    false
                } else {
                    true
                }
            })
            .map(|(name, server)| async move {
                (name.clone(), McpSession::connect(name, server).await)
            });

        let mut failed = Vec::new();
        for (name, outcome) in join_all(attempts).await {
            match outcome {
                Ok(session) => self.sessions.push(Arc::new(session)),
                Err(e) => {
                    warn!("could not connect to {}: {}", name, e);
                    failed.push(name);
                }
            }
        }
        failed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a live session exists for `name`.
    pub fn is_connected(&self, name: &str) -> bool {
        self.sessions.iter().any(|s| s.name() == name)
    }

    /// Publish every advertised remote tool into `registry`.
    ///
    /// Names collide under the registry's first-wins rule, so a server can
    /// never shadow a local tool or an earlier server's tool.
    pub fn register_tools(&self, registry: &mut ToolRegistry) {
        for session in &self.sessions {
            for info in session.tools() {
                let descriptor = ToolDescriptor::new(
                    &info.name,
                    info.description.clone().unwrap_or_else(|| {
                        format!("{} (via {})", info.name, session.name())
                    }),
                    info.input_schema
                        .clone()
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
                )
                .with_origin(ToolOrigin::Server(session.name().to_string()));
                registry.register(Arc::new(McpTool {
                    session: session.clone(),
                    remote_name: info.name.clone(),
                    descriptor,
                }));
            }
        }
    }

    /// Shut every session down, newest first.
    pub async fn cleanup(&mut self) {
        while let Some(session) = self.sessions.pop() {
            session.shutdown().await;
        }
    }
}

/// Bridges one advertised remote tool into the [`Tool`] seam.
struct McpTool {
    session: Arc<McpSession>,
    remote_name: String,
    descriptor: ToolDescriptor,
}

#[async_trait]
impl Tool for McpTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        self.session
            .call_tool(&self.remote_name, args)
            .await
            .map_err(|e| match e {
                McpError::Disconnected(msg) => ToolError::SessionClosed(msg),
                other => ToolError::ExecutionFailed(other.to_string()),
            })
    }
}
