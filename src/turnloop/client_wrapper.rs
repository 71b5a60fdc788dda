use async_trait::async_trait;
use futures_util::Stream;
use std::error::Error;
use std::pin::Pin;
use std::sync::Mutex;

/// A `ClientWrapper` is a wrapper around a specific LLM backend. It provides
/// a common interface to request replies for a message sequence, either as a
/// single response or as an incremental chunk stream. It does not keep track
/// of the conversation; for that we use a [`Conversation`](crate::Conversation)
/// which owns the history and uses a `ClientWrapper` to talk to the model.

/// Role attached to each message on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Set by the engine to steer the model's responses.
    System,
    /// A message authored by the human user.
    User,
    /// Content previously generated by the model.
    Assistant,
    /// The outcome of a tool invocation, folded back into history.
    Tool,
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// A single message in the model-facing transcript.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One fragment of a streaming reply.
///
/// Backends with different wire shapes (structured deltas, event-typed SSE
/// frames) all flatten to this type, so consumers never see provider
/// specifics. A fragment with `is_final == true` carries no further content
/// after it; the stream ends naturally once it has been yielded.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// The incremental text carried by this fragment (may be empty).
    pub content: String,
    /// Whether the backend signalled completion with this fragment.
    pub is_final: bool,
}

/// Send-able boxed error used across the streaming seam.
pub type SendError = Box<dyn Error + Send + Sync>;

/// A finite, non-restartable sequence of reply fragments.
///
/// Items arrive as the backend produces them; producers must not buffer the
/// whole reply before yielding. A mid-stream `Err` item is terminal: the
/// fragments already yielded remain valid partial output.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, SendError>> + Send>>;

/// Trait defining the interface to the model backends.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Identifier of the model this client targets, for logging.
    fn model_name(&self) -> &str;

    /// Send the message sequence and wait for the complete reply.
    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError>;

    /// Send the message sequence and get the reply as a chunk stream.
    ///
    /// The default implementation degrades to [`send_message`] and yields the
    /// whole reply as a single final chunk, so non-streaming backends still
    /// satisfy the seam.
    ///
    /// [`send_message`]: ClientWrapper::send_message
    async fn send_message_stream(&self, messages: &[Message]) -> Result<ChunkStream, SendError> {
        let reply = self.send_message(messages).await?;
        let chunk = MessageChunk {
            content: reply.content,
            is_final: true,
        };
        Ok(Box::pin(futures_util::stream::once(async move {
            Ok(chunk)
        })))
    }

    /// Usage reported by the most recent `send_message` call, if the backend
    /// tracks it. Streaming replies generally do not carry usage.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    /// Backends supporting usage tracking override this to expose their slot.
    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        None
    }
}

impl Role {
    /// Wire name used by the OpenAI-compatible and Anthropic transports.
    ///
    /// Tool results are rendered as user-role messages on the wire; providers
    /// disagree on a native tool role, and the engine already prefixes the
    /// content with the tool name.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    struct EchoClient;

    #[async_trait]
    impl ClientWrapper for EchoClient {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(Message::new(Role::Assistant, last))
        }
    }

    #[tokio::test]
    async fn default_stream_yields_single_final_chunk() {
        let client = EchoClient;
        let mut stream = client
            .send_message_stream(&[Message::new(Role::User, "hello")])
            .await
            .unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.content, "hello");
        assert!(chunk.is_final);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn tool_role_travels_as_user() {
        assert_eq!(Role::Tool.wire_name(), "user");
        assert_eq!(Role::Assistant.wire_name(), "assistant");
    }
}
