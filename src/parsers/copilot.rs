//! Parser for Copilot's plain-text log lines. Unlike the other three
//! agents, Copilot has no structured line format to speak of — it writes
//! prose to a log file, so this parser runs a small ordered set of regexes
//! over arbitrary text rather than parsing JSON.

use std::sync::OnceLock;

use regex::Regex;

use super::StreamParser;
use crate::event::{AgentEvent, EventType, EventValue};

pub struct CopilotParser;

impl StreamParser for CopilotParser {
    fn agent_name(&self) -> &'static str {
        "copilot"
    }

    fn parse_line(&self, line: &str) -> Vec<AgentEvent> {
        // First match wins; a line mentioning both "running" and "failed"
        // is reported as the failure, not the tool use, since error rules
        // are checked last and are the most specific signal available.
        if sending_request_re().is_match(line) {
            return vec![AgentEvent::new(
                EventType::Progress,
                self.agent_name(),
                "Sending request",
            )];
        }
        if received_response_re().is_match(line) {
            return vec![AgentEvent::new(
                EventType::Progress,
                self.agent_name(),
                "Received response",
            )];
        }
        if let Some(caps) = tool_call_re().captures(line) {
            let tool = caps
                .name("tool")
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown");
            return vec![
                AgentEvent::new(EventType::ToolUse, self.agent_name(), format!("Using tool: {tool}"))
                    .with_data([("tool", EventValue::from(tool))]),
            ];
        }
        if error_re().is_match(line) {
            return vec![AgentEvent::new(EventType::Error, self.agent_name(), line)];
        }
        Vec::new()
    }
}

fn sending_request_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)sending request|api call").expect("valid regex"))
}

fn received_response_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)response.*Request-ID|received response").expect("valid regex"))
}

fn tool_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:tool[_\s]?call|function call|executing|running)\s*[:\-]?\s*(?P<tool>[\w./\- ]*)")
            .expect("valid regex")
    })
}

fn error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)error|failed|exception|fatal").expect("valid regex"))
}

#[cfg(test)]
#[path = "tests/copilot_tests.rs"]
mod tests;
