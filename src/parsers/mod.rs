//! Per-agent stream parsers.
//!
//! Each parser converts one line of an agent CLI's output into zero, one,
//! or many [`AgentEvent`]s. Parsers are pure functions of their input: no
//! I/O, no shared mutable state, no blocking. The registry below is built
//! once at first use and is read-only afterwards, per the "global parser
//! registry" design note — there is no dynamic registration in this crate.

pub mod claude;
pub mod codex;
pub mod copilot;
pub mod gemini;

use crate::event::AgentEvent;

/// A stateless, agent-specific line parser.
pub trait StreamParser: Send + Sync {
    /// The agent identifier this parser handles, e.g. `"claude"`.
    fn agent_name(&self) -> &'static str;

    /// Parses one line of output into zero or more normalized events.
    /// Malformed or unrecognized lines produce an empty vector rather than
    /// an error — parser failures are non-fatal by design.
    fn parse_line(&self, line: &str) -> Vec<AgentEvent>;

    /// Extracts user-visible text from a line, if any, for reconstructing
    /// `CommandResult.stdout` under the `json_stdout` streaming method.
    /// Most lines (control events, tool-use markers) carry no text.
    fn extract_text(&self, _line: &str) -> Option<String> {
        None
    }
}

/// Static, init-time-immutable table of known parsers.
static REGISTRY: &[(&str, &dyn StreamParser)] = &[
    ("claude", &claude::ClaudeParser),
    ("gemini", &gemini::GeminiParser),
    ("codex", &codex::CodexParser),
    ("copilot", &copilot::CopilotParser),
];

/// Looks up the parser registered for `agent`, if any.
pub fn parser_for(agent: &str) -> Option<&'static dyn StreamParser> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, parser)| *parser)
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
