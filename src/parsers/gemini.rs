//! Parser for Gemini's line format: JSON objects with a small, flat set of
//! `type` values (`start`/`started`, `action`/`tool_use`, `thinking`,
//! `content`/`text`, `done`/`complete`/`finished`, `error`).

use serde_json::Value;

use super::StreamParser;
use crate::event::{AgentEvent, EventType, EventValue};

pub struct GeminiParser;

impl StreamParser for GeminiParser {
    fn agent_name(&self) -> &'static str {
        "gemini"
    }

    fn parse_line(&self, line: &str) -> Vec<AgentEvent> {
        let Some(json) = parse_json_object(line) else {
            return Vec::new();
        };
        let Some(msg_type) = json.get("type").and_then(Value::as_str) else {
            return Vec::new();
        };

        match msg_type {
            "start" | "started" => vec![AgentEvent::new(
                EventType::Started,
                self.agent_name(),
                "Agent started",
            )],
            "action" | "tool_use" => {
                let tool = json.get("tool").and_then(Value::as_str).unwrap_or("");
                if tool.is_empty() {
                    Vec::new()
                } else {
                    vec![
                        AgentEvent::new(EventType::ToolUse, self.agent_name(), format!("Using tool: {tool}"))
                            .with_data([("tool", EventValue::from(tool))]),
                    ]
                }
            }
            "thinking" => vec![AgentEvent::new(EventType::Thinking, self.agent_name(), "Thinking")],
            "content" | "text" => {
                let text = json.get("text").and_then(Value::as_str).unwrap_or("");
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![AgentEvent::new(EventType::Chunk, self.agent_name(), text)]
                }
            }
            "done" | "complete" | "finished" => vec![AgentEvent::new(
                EventType::Completed,
                self.agent_name(),
                "Execution completed",
            )],
            "error" => {
                let message = json
                    .get("error")
                    .and_then(Value::as_str)
                    .or_else(|| json.get("message").and_then(Value::as_str))
                    .unwrap_or("Agent reported an error");
                vec![AgentEvent::new(EventType::Error, self.agent_name(), message)]
            }
            _ => Vec::new(),
        }
    }

    fn extract_text(&self, line: &str) -> Option<String> {
        let json = parse_json_object(line)?;
        match json.get("type").and_then(Value::as_str) {
            Some("content") | Some("text") => json
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

fn parse_json_object(line: &str) -> Option<Value> {
    if !line.trim_start().starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

#[cfg(test)]
#[path = "tests/gemini_tests.rs"]
mod tests;
