//! The turn loop: stream a reply, extract tool calls, dispatch them, fold
//! the results back, and go around again until the model answers in prose
//! alone or the iteration cap lands.

use crate::turnloop::client_wrapper::ClientWrapper;
use crate::turnloop::config::EngineConfig;
use crate::turnloop::conversation::{clip_result, Conversation};
use crate::turnloop::event::{EventSink, TurnEvent};
use crate::turnloop::streaming::{drain_stream, StreamStatus};
use crate::turnloop::tool_call::{extract_tool_calls, strip_tool_blocks};
use crate::turnloop::tool_registry::ToolRegistry;
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model produced a reply with no tool calls.
    Completed,
    /// Cancellation was requested; partial text is preserved.
    Cancelled,
    /// The backend failed mid-stream or on connect.
    TransportError(String),
    /// The iteration cap was reached while the model still wanted tools.
    IterationLimit,
}

/// Everything one turn produced.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The prose shown to the user: every reply with its tool blocks
    /// stripped, in order.
    pub text: String,
    /// Model rounds consumed (at least 1 unless cancelled before any reply).
    pub iterations: usize,
    /// Tool invocations dispatched across the whole turn.
    pub tool_calls_made: usize,
    pub status: TurnStatus,
}

/// Drives complete turns against one model and one tool registry.
pub struct TurnEngine {
    client: Arc<dyn ClientWrapper>,
    registry: Arc<ToolRegistry>,
    config: EngineConfig,
    events: EventSink,
}

impl TurnEngine {
    pub fn new(client: Arc<dyn ClientWrapper>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            client,
            registry,
            config: EngineConfig::default(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Run one full turn for `user_input`.
    ///
    /// The user message and every intermediate exchange are recorded in
    /// `conversation` regardless of how the turn ends, so a follow-up turn
    /// sees what actually happened.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        conversation.push_user(user_input);

        let mut prose = Vec::new();
        let mut tool_calls_made = 0;
        let mut iterations = 0;

        while iterations < self.config.max_tool_iterations {
            iterations += 1;
            self.events.emit(TurnEvent::IterationStarted { iteration: iterations });

            let stream = match self
                .client
                .send_message_stream(&conversation.wire_messages())
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    return self.finish(
                        prose,
                        iterations,
                        tool_calls_made,
                        TurnStatus::TransportError(e.to_string()),
                    );
                }
            };

            let outcome = drain_stream(stream, cancel, &self.events).await;
            if !outcome.text.is_empty() {
                conversation.push_assistant(outcome.text.clone());
            }

            match outcome.status {
                StreamStatus::Completed => {}
                StreamStatus::Cancelled => {
                    push_prose(&mut prose, &outcome.text);
                    return self.finish(prose, iterations, tool_calls_made, TurnStatus::Cancelled);
                }
                StreamStatus::TransportError(msg) => {
                    push_prose(&mut prose, &outcome.text);
                    return self.finish(
                        prose,
                        iterations,
                        tool_calls_made,
                        TurnStatus::TransportError(msg),
                    );
                }
            }

            let calls = extract_tool_calls(&outcome.text);
            push_prose(&mut prose, &outcome.text);

            if calls.is_empty() {
                return self.finish(prose, iterations, tool_calls_made, TurnStatus::Completed);
            }

            // Calls run strictly in order; a failure is folded back like any
            // other result so the model can react to it.
            for call in calls {
                if cancel.is_cancelled() {
                    return self.finish(prose, iterations, tool_calls_made, TurnStatus::Cancelled);
                }
                self.events.emit(TurnEvent::ToolStarted {
                    name: call.name.clone(),
                });
                let result = self.registry.execute(&call.name, call.args).await;
                if !result.success {
                    warn!("tool {} failed: {}", result.tool_name, result.content);
                }
                self.events.emit(TurnEvent::ToolFinished {
                    name: result.tool_name.clone(),
                    ok: result.success,
                });
                tool_calls_made += 1;
                let clipped = clip_result(&result.content, self.config.tool_result_limit);
                conversation.push_tool_result(&result.tool_name, &clipped);
            }
        }

        info!(
            "turn hit the {}-iteration cap with tools still pending",
            self.config.max_tool_iterations
        );
        self.finish(prose, iterations, tool_calls_made, TurnStatus::IterationLimit)
    }

    fn finish(
        &self,
        prose: Vec<String>,
        iterations: usize,
        tool_calls_made: usize,
        status: TurnStatus,
    ) -> TurnOutcome {
        self.events.emit(TurnEvent::TurnComplete);
        TurnOutcome {
            text: prose.join("\n"),
            iterations,
            tool_calls_made,
            status,
        }
    }
}

fn push_prose(prose: &mut Vec<String>, raw: &str) {
    let stripped = strip_tool_blocks(raw);
    if !stripped.trim().is_empty() {
        prose.push(stripped);
    }
}
