//! Drains a reply stream into a complete assistant message.
//!
//! The aggregator is the single place where chunk streams, cancellation and
//! transport failure meet. Whatever happens mid-stream, the text collected so
//! far is preserved and returned with a status describing how the stream
//! ended.

use crate::turnloop::client_wrapper::ChunkStream;
use crate::turnloop::event::{EventSink, TurnEvent};
use futures_util::StreamExt;
use log::debug;
use tokio_util::sync::CancellationToken;

/// How a stream drain ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    /// The backend signalled completion.
    Completed,
    /// A mid-stream transport or decode failure; the message carries details.
    TransportError(String),
    /// Cancellation was requested before the stream finished.
    Cancelled,
}

/// The aggregated result of draining one reply stream.
#[derive(Clone, Debug)]
pub struct StreamOutcome {
    /// Every fragment received before the stream ended, concatenated in
    /// arrival order.
    pub text: String,
    pub status: StreamStatus,
}

impl StreamOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == StreamStatus::Completed
    }
}

/// Consume `stream` to its end, forwarding each fragment to `events`.
///
/// Cancellation is observed between fragments; a fragment already yielded is
/// always kept. A mid-stream `Err` item stops the drain without discarding
/// the partial text.
pub async fn drain_stream(
    mut stream: ChunkStream,
    cancel: &CancellationToken,
    events: &EventSink,
) -> StreamOutcome {
    let mut text = String::new();

    loop {
        let item = tokio::select! {
            // Cancellation wins over a ready chunk, so a cancelled drain
            // never consumes further input.
            biased;
            _ = cancel.cancelled() => {
                debug!("stream drain cancelled after {} bytes", text.len());
                return StreamOutcome {
                    text,
                    status: StreamStatus::Cancelled,
                };
            }
            item = stream.next() => item,
        };

        match item {
            Some(Ok(chunk)) => {
                if !chunk.content.is_empty() {
                    events.emit(TurnEvent::TextChunk(chunk.content.clone()));
                    text.push_str(&chunk.content);
                }
                if chunk.is_final {
                    return StreamOutcome {
                        text,
                        status: StreamStatus::Completed,
                    };
                }
            }
            Some(Err(e)) => {
                let msg = e.to_string();
                // The failure is part of the reply: the marker travels with
                // the partial text into history and the user-facing output.
                let marker = format!("[Error communicating with model: {}]", msg);
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                events.emit(TurnEvent::TextChunk(marker.clone()));
                text.push_str(&marker);
                return StreamOutcome {
                    text,
                    status: StreamStatus::TransportError(msg),
                };
            }
            // Stream exhausted without a final marker; the backend closed
            // cleanly, so treat the reply as complete.
            None => {
                return StreamOutcome {
                    text,
                    status: StreamStatus::Completed,
                };
            }
        }
    }
}
