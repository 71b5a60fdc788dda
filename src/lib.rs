//! # turnloop
//!
//! turnloop is an agent turn-execution engine: it streams a model's reply,
//! extracts the tool calls embedded in it, dispatches them across local tools
//! and stdio MCP tool servers through one registry, folds the results back
//! into the conversation, and repeats until the model answers in prose or
//! the iteration cap lands.
//!
//! The crate is layered as:
//!
//! * **Provider seam**: the [`ClientWrapper`] trait, implemented for
//!   OpenAI-compatible endpoints and the Anthropic Messages API, both with
//!   incremental streaming
//! * **Streaming aggregation**: [`streaming::drain_stream`] turns a chunk
//!   stream into a complete reply while honoring cancellation and keeping
//!   partial text on transport failure
//! * **Tool extraction and dispatch**: [`tool_call`] parses fenced `tool`
//!   blocks out of assistant text; [`ToolRegistry`] dispatches them
//!   uniformly, whether a tool is a local function or lives behind a
//!   server session
//! * **Tool servers**: [`McpSession`] speaks JSON-RPC to a child process
//!   over stdio; [`McpManager`] connects every configured server
//!   concurrently and publishes their tools into the registry
//! * **The turn loop**: [`TurnEngine`] drives complete turns with a hard
//!   iteration cap, emitting [`TurnEvent`]s as it goes
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use turnloop::clients::openai::OpenAIClient;
//! use turnloop::{build_system_prompt, Conversation, ToolRegistry, TurnEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     turnloop::init_logger();
//!
//!     let client = Arc::new(OpenAIClient::new(
//!         &std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4o-mini",
//!     ));
//!
//!     let mut registry = ToolRegistry::new();
//!     turnloop::tools::register_local_tools(&mut registry);
//!
//!     let system = build_system_prompt("You are a coding assistant.", &registry.descriptors());
//!     let mut conversation = Conversation::new(system, 100_000);
//!
//!     let engine = TurnEngine::new(client, Arc::new(registry));
//!     let outcome = engine
//!         .run_turn(&mut conversation, "What does main.py do?", &CancellationToken::new())
//!         .await;
//!
//!     println!("{}", outcome.text);
//!     Ok(())
//! }
//! ```
//!
//! Tool servers come from a JSON config file mapping a server name to the
//! command that launches it; see [`McpConfig`] and [`McpManager`].

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding the engine get `RUST_LOG` driven diagnostics
/// without committing to a logging backend of their own.
///
/// ```rust
/// turnloop::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod turnloop;

pub use crate::turnloop::client_wrapper;
pub use crate::turnloop::client_wrapper::{
    ChunkStream, ClientWrapper, Message, MessageChunk, Role, SendError, TokenUsage,
};
pub use crate::turnloop::clients;
pub use crate::turnloop::config::{EngineConfig, McpConfig, McpServerConfig};
pub use crate::turnloop::conversation;
pub use crate::turnloop::conversation::{build_system_prompt, Conversation};
pub use crate::turnloop::event;
pub use crate::turnloop::event::{EventSink, TurnEvent};
pub use crate::turnloop::mcp_manager::McpManager;
pub use crate::turnloop::mcp_protocol;
pub use crate::turnloop::mcp_session::{McpError, McpSession};
pub use crate::turnloop::streaming;
pub use crate::turnloop::streaming::{StreamOutcome, StreamStatus};
pub use crate::turnloop::tool_call;
pub use crate::turnloop::tool_call::{extract_tool_calls, strip_tool_blocks, ToolCallRequest};
pub use crate::turnloop::tool_registry;
pub use crate::turnloop::tool_registry::{
    Tool, ToolDescriptor, ToolError, ToolOrigin, ToolRegistry, ToolResult,
};
pub use crate::turnloop::tools;
pub use crate::turnloop::turn::{TurnEngine, TurnOutcome, TurnStatus};
