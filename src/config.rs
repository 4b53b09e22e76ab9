//! Caller-supplied description of one adapter invocation.
//!
//! This crate never reads a config file itself — the orchestration layer
//! loads whatever YAML/TOML it wants and hands the executor an
//! [`AdapterConfig`]. Everything here is plain data; there is no parsing
//! logic in this module.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default overall execution timeout when neither the caller nor the
/// context supplies one.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Describes how to invoke one agent adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Lowercase agent identifier, e.g. `"claude"`. Used to look up the
    /// stream config and the parser registry.
    pub agent_name: String,
    /// The configured binary path or command. May be multi-word (e.g.
    /// `"gh copilot"`); the executor tokenizes it by whitespace.
    pub command: String,
    /// Extra argv tokens appended after the caller's own arguments, before
    /// any streaming flags injected from the stream-config table.
    pub extra_args: Vec<String>,
    /// Working directory used when the caller doesn't supply one.
    pub work_dir: Option<PathBuf>,
    /// Environment variables layered on top of the inherited process
    /// environment (e.g. an API base URL).
    pub extra_env: HashMap<String, String>,
    /// Overall execution timeout; falls back to [`DEFAULT_OVERALL_TIMEOUT`]
    /// when unset and the caller gives no timeout either.
    pub overall_timeout: Option<Duration>,
    /// Idle timeout: if no output is observed for this long during a
    /// streaming execution, the child is killed. `None` disables it.
    pub idle_timeout: Option<Duration>,
}

impl AdapterConfig {
    pub fn new(agent_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            command: command.into(),
            extra_args: Vec::new(),
            work_dir: None,
            extra_env: HashMap::new(),
            overall_timeout: None,
            idle_timeout: None,
        }
    }

    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args = args.into_iter().collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_extra_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_env = env.into_iter().collect();
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
