use tokio::sync::mpsc::UnboundedSender;

/// Progress notifications emitted while a turn runs.
///
/// Consumers subscribe through an unbounded channel so a slow UI never stalls
/// the engine. Every event is best-effort: a dropped receiver is ignored.
#[derive(Clone, Debug)]
pub enum TurnEvent {
    /// A fragment of assistant text arrived from the model.
    TextChunk(String),
    /// A tool invocation is about to run.
    ToolStarted { name: String },
    /// A tool invocation finished; `ok` is false when the tool reported failure.
    ToolFinished { name: String, ok: bool },
    /// The engine begins another model round after folding tool results.
    IterationStarted { iteration: usize },
    /// The turn reached a terminal state.
    TurnComplete,
}

/// Cloneable handle used by the engine to publish [`TurnEvent`]s.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<TurnEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn new(tx: UnboundedSender<TurnEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
