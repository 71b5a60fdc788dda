//! One live connection to a stdio tool server.
//!
//! The server is a child process speaking newline-delimited JSON-RPC on its
//! stdin/stdout. A background task owns stdout and routes each response to
//! the waiting caller by request id; stderr is drained separately so a chatty
//! server cannot block on a full pipe. When the process exits, every pending
//! call fails promptly instead of waiting out its timeout.

use crate::turnloop::config::McpServerConfig;
use crate::turnloop::mcp_protocol::*;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};

/// Per-request deadline covering the handshake and every tool call.
pub const MCP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while talking to a tool server.
#[derive(Debug)]
pub enum McpError {
    /// The server process could not be spawned.
    Spawn(String),
    /// The server exited or closed its pipes.
    Disconnected(String),
    /// No response arrived within the deadline.
    Timeout(String),
    /// The server answered with a JSON-RPC error object.
    Rpc { code: i64, message: String },
    /// The response decoded but did not have the expected shape.
    Protocol(String),
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            McpError::Spawn(msg) => write!(f, "failed to spawn server: {}", msg),
            McpError::Disconnected(msg) => write!(f, "server disconnected: {}", msg),
            McpError::Timeout(msg) => write!(f, "request timed out: {}", msg),
            McpError::Rpc { code, message } => write!(f, "server error {}: {}", code, message),
            McpError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for McpError {}

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Response>>>>;

/// An initialized session with one tool server.
///
/// A session is only ever observable in its initialized state: [`connect`]
/// completes the spawn, handshake and tool enumeration before returning, and
/// after [`shutdown`] the value is gone. A session that fails mid-life stays
/// usable as a handle; calls just return [`McpError::Disconnected`].
///
/// [`connect`]: McpSession::connect
/// [`shutdown`]: McpSession::shutdown
pub struct McpSession {
    name: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicI64,
    tools: Vec<RemoteToolInfo>,
}

impl McpSession {
    /// Spawn the configured server and bring it to the initialized state.
    ///
    /// On any failure along the way the child is killed and the error
    /// returned, so no half-connected session ever escapes.
    pub async fn connect(name: &str, config: &McpServerConfig) -> Result<Self, McpError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| McpError::Spawn(format!("{}: {}", config.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Spawn("stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Spawn("stdout not captured".into()))?;
        if let Some(stderr) = child.stderr.take() {
            let server = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{} stderr] {}", server, line);
                }
            });
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        spawn_reader(name.to_string(), stdout, pending.clone());

        let mut session = Self {
            name: name.to_string(),
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicI64::new(0),
            tools: Vec::new(),
        };

        match session.handshake().await {
            Ok(tools) => {
                info!("connected to {} ({} tools)", name, tools.len());
                session.tools = tools;
                Ok(session)
            }
            Err(e) => {
                session.kill().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<Vec<RemoteToolInfo>, McpError> {
        let params = serde_json::to_value(InitializeParams::current())
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        self.request(METHOD_INITIALIZE, Some(params)).await?;
        self.notify(Notification::initialized()).await?;

        let result = self.request(METHOD_TOOLS_LIST, None).await?;
        let listed: ToolsListResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(listed.tools)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools the server advertised during the handshake.
    pub fn tools(&self) -> &[RemoteToolInfo] {
        &self.tools
    }

    /// Invoke a remote tool and flatten its reply to transcript text.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<String, McpError> {
        let params = serde_json::to_value(ToolsCallParams {
            name: tool.to_string(),
            arguments,
        })
        .map_err(|e| McpError::Protocol(e.to_string()))?;

        let result = self.request(METHOD_TOOLS_CALL, Some(params)).await?;
        let call: ToolsCallResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        if call.is_error {
            return Err(McpError::Rpc {
                code: 0,
                message: call.flatten(),
            });
        }
        Ok(call.flatten())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let wire = Request::new(id, method, params);
        if let Err(e) = self.write_line(&wire).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(
            Duration::from_secs(MCP_REQUEST_TIMEOUT_SECS),
            rx,
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            // Sender dropped: the reader task saw EOF and cleared the map.
            Ok(Err(_)) => {
                return Err(McpError::Disconnected(format!(
                    "{} closed before answering {}",
                    self.name, method
                )));
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(McpError::Timeout(format!("{} on {}", method, self.name)));
            }
        };

        if let Some(err) = response.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol(format!("{} reply had no result", method)))
    }

    async fn notify(&self, notification: Notification) -> Result<(), McpError> {
        self.write_line(&notification).await
    }

    async fn write_line<T: serde::Serialize>(&self, message: &T) -> Result<(), McpError> {
        let mut line =
            serde_json::to_string(message).map_err(|e| McpError::Protocol(e.to_string()))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Disconnected(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Disconnected(e.to_string()))
    }

    async fn kill(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!("kill {} failed: {}", self.name, e);
        }
    }

    /// Terminate the server process. Pending calls fail as disconnected.
    pub async fn shutdown(&self) {
        info!("shutting down {}", self.name);
        self.kill().await;
        self.pending.lock().await.clear();
    }
}

fn spawn_reader(name: String, stdout: tokio::process::ChildStdout, pending: PendingMap) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Response>(line) {
                        Ok(response) => {
                            let id = match response.id {
                                Some(id) => id,
                                // Server-initiated notification; ignored.
                                None => continue,
                            };
                            if let Some(tx) = pending.lock().await.remove(&id) {
                                let _ = tx.send(response);
                            } else {
                                warn!("{}: response for unknown id {}", name, id);
                            }
                        }
                        Err(e) => warn!("{}: undecodable line: {}", name, e),
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        // EOF: wake every waiter instead of letting them time out.
        debug!("{}: stdout closed", name);
        pending.lock().await.clear();
    });
}
