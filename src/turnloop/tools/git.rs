//! Read-only git inspection tools. Each one shells out to the `git` binary
//! in the requested directory.

use super::{optional_str, optional_usize};
use crate::turnloop::tool_registry::{Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use tokio::process::Command;

lazy_static! {
    static ref GIT_STATUS_DESC: ToolDescriptor = ToolDescriptor::new(
        "git_status",
        "Show the working tree status",
        json!({"type": "object", "properties": {"cwd": {"type": "string"}}}),
    );
    static ref GIT_DIFF_DESC: ToolDescriptor = ToolDescriptor::new(
        "git_diff",
        "Show changes against a target revision (default HEAD)",
        json!({"type": "object", "properties": {
            "cwd": {"type": "string"},
            "target": {"type": "string"}
        }}),
    );
    static ref GIT_LOG_DESC: ToolDescriptor = ToolDescriptor::new(
        "git_log",
        "Show recent commits, one per line (default 10)",
        json!({"type": "object", "properties": {
            "cwd": {"type": "string"},
            "count": {"type": "integer"}
        }}),
    );
}

async fn run_git(cwd: &str, args: &[&str]) -> Result<String, ToolError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::ExecutionFailed(stderr.trim().to_string()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim_end();
    if trimmed.is_empty() {
        Ok("(clean)".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

pub struct GitStatus;

#[async_trait]
impl Tool for GitStatus {
    fn descriptor(&self) -> &ToolDescriptor {
        &GIT_STATUS_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let cwd = optional_str(&args, "cwd", ".");
        run_git(cwd, &["status", "--short"]).await
    }
}

pub struct GitDiff;

#[async_trait]
impl Tool for GitDiff {
    fn descriptor(&self) -> &ToolDescriptor {
        &GIT_DIFF_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let cwd = optional_str(&args, "cwd", ".");
        let target = optional_str(&args, "target", "HEAD");
        run_git(cwd, &["diff", target]).await
    }
}

pub struct GitLog;

#[async_trait]
impl Tool for GitLog {
    fn descriptor(&self) -> &ToolDescriptor {
        &GIT_LOG_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let cwd = optional_str(&args, "cwd", ".");
        let count = optional_usize(&args, "count", 10);
        run_git(cwd, &["log", "--oneline", &format!("-{}", count)]).await
    }
}
