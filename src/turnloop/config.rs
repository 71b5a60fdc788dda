//! Engine and tool-server configuration.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Knobs governing a turn's execution.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard cap on model rounds within one turn.
    pub max_tool_iterations: usize,
    /// Tool output beyond this many characters is truncated before it is
    /// folded back into the conversation.
    pub tool_result_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            tool_result_limit: 4000,
        }
    }
}

/// How to launch one stdio tool server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// The full tool-server configuration file: a map of server name to the
/// command that launches it. BTreeMap keeps connection attempts in a
/// stable order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, McpServerConfig>,
}

impl McpConfig {
    /// Default location: `~/.turnloop/mcp.json`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".turnloop").join("mcp.json"))
    }

    /// Read the configuration file. A missing file is an empty configuration,
    /// not an error; a present but unreadable one is.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };
        serde_json::from_str(&raw).map_err(|e| {
            warn!("invalid server config at {}: {}", path.display(), e);
            io::Error::new(io::ErrorKind::InvalidData, e)
        })
    }

    /// Add or replace a server entry and immediately rewrite the file.
    pub fn add_server(
        &mut self,
        path: &Path,
        name: impl Into<String>,
        server: McpServerConfig,
    ) -> io::Result<()> {
        self.servers.insert(name.into(), server);
        self.save(path)
    }

    /// Remove a server entry, rewriting the file only if it was present.
    /// Returns whether the entry existed.
    pub fn remove_server(&mut self, path: &Path, name: &str) -> io::Result<bool> {
        if self.servers.remove(name).is_none() {
            return Ok(false);
        }
        self.save(path)?;
        Ok(true)
    }

    /// Write the configuration file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, raw)
    }
}
