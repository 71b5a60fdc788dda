//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Works against any server speaking the `/chat/completions` dialect, which
//! in practice covers OpenAI itself plus Grok, OpenRouter, Ollama and most
//! self-hosted gateways, by pointing `base_url` at the provider.

use crate::turnloop::client_wrapper::{
    ChunkStream, ClientWrapper, Message, MessageChunk, Role, SendError, TokenUsage,
};
use crate::turnloop::clients::common::{http_client, sse_data, SseLineBuffer};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    last_usage: Mutex<Option<TokenUsage>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::new_with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn new_with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(),
            last_usage: Mutex::new(None),
        }
    }

    fn request_body<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire_name(),
                    content: &m.content,
                })
                .collect(),
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, SendError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("chat completions request failed ({}): {}", status, text).into());
        }
        Ok(resp)
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.last_usage)
    }

    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError> {
        let body = self.request_body(messages, false);
        let resp: ChatResponse = self.post(&body).await?.json().await?;

        if let Some(u) = resp.usage {
            if let Ok(mut slot) = self.last_usage.lock() {
                *slot = Some(TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }
        }

        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or("chat completions response carried no choices")?;
        Ok(Message::new(Role::Assistant, content))
    }

    async fn send_message_stream(&self, messages: &[Message]) -> Result<ChunkStream, SendError> {
        let body = self.request_body(messages, true);
        let resp = self.post(&body).await?;

        let stream = resp.bytes_stream();
        let out = async_stream(stream);
        Ok(out)
    }
}

fn async_stream<B, E>(
    mut bytes: impl futures_util::Stream<Item = Result<B, E>> + Send + Unpin + 'static,
) -> ChunkStream
where
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
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
                if data == "[DONE]" {
                    let _ = tx
                        .send(Ok(MessageChunk {
                            content: String::new(),
                            is_final: true,
                        }))
                        .await;
                    return;
                }
                match serde_json::from_str::<StreamEvent>(data) {
                    Ok(ev) => {
                        for choice in ev.choices {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty()
                                    && tx
                                        .send(Ok(MessageChunk {
                                            content,
                                            is_final: false,
                                        }))
                                        .await
                                        .is_err()
                                {
                                    return;
                                }
                            }
                            if choice.finish_reason.is_some() {
                                let _ = tx
                                    .send(Ok(MessageChunk {
                                        content: String::new(),
                                        is_final: true,
                                    }))
                                    .await;
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("skipping undecodable stream event: {}", e),
                }
            }
        }
        // Connection closed without [DONE]; treat what we have as complete.
        let _ = tx
            .send(Ok(MessageChunk {
                content: String::new(),
                is_final: true,
            }))
            .await;
    });

    Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_delta_decodes() {
        let data = r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        let ev: StreamEvent = serde_json::from_str(data).unwrap();
        assert_eq!(ev.choices[0].delta.content.as_deref(), Some("Hi"));
        assert!(ev.choices[0].finish_reason.is_none());
    }

    #[test]
    fn finish_reason_decodes_with_empty_delta() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let ev: StreamEvent = serde_json::from_str(data).unwrap();
        assert!(ev.choices[0].delta.content.is_none());
        assert_eq!(ev.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn request_serializes_wire_roles() {
        let client = OpenAIClient::new("k", "gpt-4o");
        let messages = vec![
            Message::new(Role::System, "be terse"),
            Message::new(Role::Tool, "[read_file]: ok"),
        ];
        let body = client.request_body(&messages, true);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["stream"], true);
    }
}
