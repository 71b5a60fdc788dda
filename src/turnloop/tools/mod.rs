//! Built-in local tools: filesystem access, shell execution and git
//! inspection. Each tool takes a JSON object of arguments and returns plain
//! text for the transcript.

pub mod fs;
pub mod git;
pub mod shell;

use crate::turnloop::tool_registry::{ToolError, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;

/// Register the full built-in suite.
pub fn register_local_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(fs::ReadFile));
    registry.register(Arc::new(fs::WriteFile));
    registry.register(Arc::new(fs::EditFile));
    registry.register(Arc::new(fs::ListDir));
    registry.register(Arc::new(fs::Search));
    registry.register(Arc::new(fs::Glob));
    registry.register(Arc::new(shell::Execute));
    registry.register(Arc::new(git::GitStatus));
    registry.register(Arc::new(git::GitDiff));
    registry.register(Arc::new(git::GitLog));
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string field {:?}", key)))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub(crate) fn optional_usize(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

pub(crate) fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}
