//! Parser for Claude's Anthropic-streaming-style line format: JSON objects
//! carrying `message_start`, `content_block_start`/`content_block_delta`,
//! `message_stop`/`message_delta`, and `error` types.

use serde_json::Value;

use super::StreamParser;
use crate::event::{AgentEvent, EventType, EventValue};

pub struct ClaudeParser;

impl StreamParser for ClaudeParser {
    fn agent_name(&self) -> &'static str {
        "claude"
    }

    fn parse_line(&self, line: &str) -> Vec<AgentEvent> {
        let Some(json) = parse_json_object(line) else {
            return Vec::new();
        };
        let Some(msg_type) = json.get("type").and_then(Value::as_str) else {
            return Vec::new();
        };

        match msg_type {
            "message_start" => vec![started_event(self.agent_name(), &json)],
            "content_block_start" => tool_use_event(self.agent_name(), &json)
                .into_iter()
                .collect(),
            "content_block_delta" => content_block_delta_event(self.agent_name(), &json)
                .into_iter()
                .collect(),
            "message_stop" => {
                let (tokens_in, tokens_out) = extract_usage(&json);
                vec![completed_event(self.agent_name(), tokens_in, tokens_out)]
            }
            "message_delta" => {
                let (tokens_in, tokens_out) = extract_usage(&json);
                if tokens_out > 0 {
                    vec![completed_event(self.agent_name(), tokens_in, tokens_out)]
                } else {
                    Vec::new()
                }
            }
            "error" => vec![error_event(self.agent_name(), &json)],
            _ => Vec::new(),
        }
    }

    fn extract_text(&self, line: &str) -> Option<String> {
        let json = parse_json_object(line)?;
        if json.get("type").and_then(Value::as_str) != Some("content_block_delta") {
            return None;
        }
        json.pointer("/delta/text")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Lines not starting with `{` are ignored outright.
fn parse_json_object(line: &str) -> Option<Value> {
    if !line.trim_start().starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

fn started_event(agent: &str, json: &Value) -> AgentEvent {
    let event = AgentEvent::new(EventType::Started, agent, "Message started");
    match json.pointer("/message/model").and_then(Value::as_str) {
        Some(model) => event.with_data([("model", EventValue::from(model))]),
        None => event,
    }
}

fn tool_use_event(agent: &str, json: &Value) -> Option<AgentEvent> {
    if json.pointer("/content_block/type").and_then(Value::as_str) != Some("tool_use") {
        return None;
    }
    let tool = json.pointer("/content_block/name").and_then(Value::as_str)?;
    Some(
        AgentEvent::new(EventType::ToolUse, agent, format!("Using tool: {tool}"))
            .with_data([("tool", EventValue::from(tool))]),
    )
}

fn content_block_delta_event(agent: &str, json: &Value) -> Option<AgentEvent> {
    let delta_type = json.pointer("/delta/type").and_then(Value::as_str)?;
    if delta_type.starts_with("thinking") {
        return Some(AgentEvent::new(EventType::Thinking, agent, "Thinking"));
    }
    if delta_type == "text_delta" {
        let text = json.pointer("/delta/text").and_then(Value::as_str)?;
        if text.is_empty() {
            return None;
        }
        return Some(AgentEvent::new(EventType::Chunk, agent, text));
    }
    None
}

fn extract_usage(json: &Value) -> (i64, i64) {
    let usage = json
        .pointer("/message/usage")
        .or_else(|| json.get("usage"));
    let tokens_in = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let tokens_out = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    (tokens_in, tokens_out)
}

fn completed_event(agent: &str, tokens_in: i64, tokens_out: i64) -> AgentEvent {
    AgentEvent::new(EventType::Completed, agent, "Execution completed").with_data([
        ("tokens_in", EventValue::from(tokens_in)),
        ("tokens_out", EventValue::from(tokens_out)),
    ])
}

fn error_event(agent: &str, json: &Value) -> AgentEvent {
    let message = json
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("Agent reported an error");
    AgentEvent::new(EventType::Error, agent, message)
}

#[cfg(test)]
#[path = "tests/claude_tests.rs"]
mod tests;
