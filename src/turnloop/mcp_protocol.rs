//! JSON-RPC 2.0 message shapes for the Model Context Protocol, limited to
//! the three methods the engine drives: `initialize`, `tools/list` and
//! `tools/call`. Requests and responses travel as newline-delimited JSON
//! over a child process's stdio.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

#[derive(Serialize, Debug)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: i64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A notification carries no id and expects no reply.
#[derive(Serialize, Debug)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
}

impl Notification {
    pub fn initialized() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: METHOD_INITIALIZED.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Response {
    pub id: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Serialize, Debug)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: &'static str,
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

#[derive(Serialize, Debug)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl InitializeParams {
    pub fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: Value::Object(serde_json::Map::new()),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<RemoteToolInfo>,
}

/// Tool advertisement as published by a server.
#[derive(Clone, Deserialize, Debug)]
pub struct RemoteToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

#[derive(Serialize, Debug)]
pub struct ToolsCallParams {
    pub name: String,
    pub arguments: Value,
}

#[derive(Deserialize, Debug)]
pub struct ToolsCallResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// One part of a tool call's result payload.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: Option<String>,
    },
    #[serde(rename = "resource")]
    Resource { resource: ResourceRef },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
pub struct ResourceRef {
    #[serde(default)]
    pub uri: Option<String>,
}

impl ToolsCallResult {
    /// Flatten the content parts to a single string for the transcript.
    /// Non-text parts become placeholders naming what was there.
    pub fn flatten(&self) -> String {
        let mut parts = Vec::new();
        for part in &self.content {
            match part {
                ContentPart::Text { text } => parts.push(text.clone()),
                ContentPart::Image { mime_type } => parts.push(format!(
                    "[Image: {}]",
                    mime_type.as_deref().unwrap_or("unknown")
                )),
                ContentPart::Resource { resource } => parts.push(format!(
                    "[Resource: {}]",
                    resource.uri.as_deref().unwrap_or("unknown")
                )),
                ContentPart::Unknown => {}
            }
        }
        parts.join("\n")
    }
}
