pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod conversation;
pub mod event;
pub mod mcp_manager;
pub mod mcp_protocol;
pub mod mcp_session;
pub mod streaming;
pub mod tool_call;
pub mod tool_registry;
pub mod tools;
pub mod turn;
