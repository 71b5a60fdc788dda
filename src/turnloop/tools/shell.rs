//! Shell execution tool.

use super::{optional_str, required_str};
use crate::turnloop::tool_registry::{Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

lazy_static! {
    static ref EXECUTE_DESC: ToolDescriptor = ToolDescriptor::new(
        "execute",
        "Run a shell command and return its output",
        json!({"type": "object", "properties": {
            "command": {"type": "string"},
            "cwd": {"type": "string"}
        }, "required": ["command"]}),
    );
}

pub struct Execute;

#[async_trait]
impl Tool for Execute {
    fn descriptor(&self) -> &ToolDescriptor {
        &EXECUTE_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let command = required_str(&args, "command")?;
        let cwd = optional_str(&args, "cwd", ".");

        let mut child = Command::new("sh");
        child.arg("-c").arg(command).current_dir(cwd);

        let output = tokio::time::timeout(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            child.output(),
        )
        .await
        .map_err(|_| {
            ToolError::ExecutionFailed(format!(
                "command timed out after {}s",
                DEFAULT_TIMEOUT_SECS
            ))
        })?
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut report = String::new();
        if !stdout.trim().is_empty() {
            report.push_str(stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str("stderr: ");
            report.push_str(stderr.trim_end());
        }
        if !output.status.success() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str(&format!(
                "exit code: {}",
                output.status.code().unwrap_or(-1)
            ));
        }
        if report.is_empty() {
            report.push_str("(no output)");
        }
        Ok(report)
    }
}
