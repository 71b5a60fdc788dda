//! Client for the Anthropic Messages API.
//!
//! Unlike the chat-completions dialect, Anthropic takes the system prompt as
//! a top-level field and tags each SSE frame with an event type, so the
//! stream decoding here keys on `type` rather than on delta presence.

use crate::turnloop::client_wrapper::{
    ChunkStream, ClientWrapper, Message, MessageChunk, Role, SendError, TokenUsage,
};
use crate::turnloop::clients::common::{http_client, sse_data, SseLineBuffer};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
    last_usage: Mutex<Option<TokenUsage>>,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[derive(Deserialize)]
struct StreamFrame {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<FrameDelta>,
}

#[derive(Deserialize)]
struct FrameDelta {
    text: Option<String>,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client: http_client(),
            last_usage: Mutex::new(None),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// System messages move to the top-level `system` field; everything else
    /// stays in order in the `messages` array.
    fn request_body<'a>(&'a self, messages: &'a [Message], stream: bool) -> MessagesRequest<'a> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| WireMessage {
                    role: m.role.wire_name(),
                    content: &m.content,
                })
                .collect(),
            stream,
        }
    }

    async fn post(&self, body: &MessagesRequest<'_>) -> Result<reqwest::Response, SendError> {
        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("messages request failed ({}): {}", status, text).into());
        }
        Ok(resp)
    }
}

#[async_trait]
impl ClientWrapper for ClaudeClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.last_usage)
    }

    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError> {
        let body = self.request_body(messages, false);
        let resp: MessagesResponse = self.post(&body).await?.json().await?;

        if let Some(u) = resp.usage {
            if let Ok(mut slot) = self.last_usage.lock() {
                *slot = Some(TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                    total_tokens: u.input_tokens + u.output_tokens,
                });
            }
        }

        let text: String = resp
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        Ok(Message::new(Role::Assistant, text))
    }

    async fn send_message_stream(&self, messages: &[Message]) -> Result<ChunkStream, SendError> {
        let body = self.request_body(messages, true);
        let resp = self.post(&body).await?;
        let mut bytes = resp.bytes_stream();

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<MessageChunk, SendError>>(32);
        tokio::spawn(async move {
            let mut lines = SseLineBuffer::new();
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as SendError)).await;
                        return;
                    }
                };
                let text = String::from_utf8_lossy(chunk.as_ref()).into_owned();
                for line in lines.push(&text) {
                    let data = match sse_data(&line) {
                        Some(d) => d,
                        None => continue,
                    };
                    let frame = match serde_json::from_str::<StreamFrame>(data) {
                        Ok(f) => f,
                        Err(e) => {
                            warn!("skipping undecodable stream frame: {}", e);
                            continue;
                        }
                    };
                    match frame.kind.as_str() {
                        "content_block_delta" => {
                            if let Some(text) = frame.delta.and_then(|d| d.text) {
                                if !text.is_empty()
                                    && tx
                                        .send(Ok(MessageChunk {
                                            content: text,
                                            is_final: false,
                                        }))
                                        .await
                                        .is_err()
                                {
                                    return;
                                }
                            }
                        }
                        "message_stop" => {
                            let _ = tx
                                .send(Ok(MessageChunk {
                                    content: String::new(),
                                    is_final: true,
                                }))
                                .await;
                            return;
                        }
                        _ => {}
                    }
                }
            }
            let _ = tx
                .send(Ok(MessageChunk {
                    content: String::new(),
                    is_final: true,
                }))
                .await;
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}
