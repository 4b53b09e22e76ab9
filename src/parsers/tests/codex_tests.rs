use super::*;
use crate::event::EventType;

fn parse(line: &str) -> Vec<AgentEvent> {
    CodexParser.parse_line(line)
}

#[test]
fn start_variants_emit_started() {
    for ty in ["start", "session_start", "thread.started"] {
        let events = parse(&format!(r#"{{"type":"{ty}"}}"#));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Started);
    }
}

#[test]
fn turn_started_emits_progress() {
    let events = parse(r#"{"type":"turn.started"}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Progress);
}

#[test]
fn item_started_command_execution_emits_tool_use() {
    let events = parse(r#"{"type":"item.started","item":{"type":"command_execution"}}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::ToolUse);
    assert_eq!(events[0].data.get("tool").unwrap(), "command_execution");
}

#[test]
fn item_started_file_edit_emits_tool_use() {
    let events = parse(r#"{"type":"item.started","item":{"type":"file_edit"}}"#);
    assert_eq!(events[0].event_type, EventType::ToolUse);
}

#[test]
fn item_started_other_types_emit_nothing() {
    assert!(parse(r#"{"type":"item.started","item":{"type":"reasoning"}}"#).is_empty());
}

#[test]
fn item_completed_reasoning_emits_thinking() {
    let events = parse(r#"{"type":"item.completed","item":{"type":"reasoning","text":"because"}}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Thinking);
    assert_eq!(events[0].data.get("reasoning_text").unwrap(), "because");
}

#[test]
fn item_completed_command_execution_emits_progress_with_exit_code() {
    let events = parse(
        r#"{"type":"item.completed","item":{"type":"command_execution","command":"ls","exit_code":1}}"#,
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Progress);
    assert_eq!(events[0].data.get("command").unwrap(), "ls");
    assert_eq!(events[0].data.get("exit_code").unwrap(), "1");
}

#[test]
fn item_completed_agent_message_emits_progress() {
    let events = parse(r#"{"type":"item.completed","item":{"type":"agent_message","text":"done"}}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Progress);
}

#[test]
fn item_completed_unknown_type_emits_nothing() {
    assert!(parse(r#"{"type":"item.completed","item":{"type":"mystery"}}"#).is_empty());
}

#[test]
fn done_variants_emit_completed_with_usage() {
    for ty in ["done", "complete", "turn.completed"] {
        let events = parse(&format!(
            r#"{{"type":"{ty}","usage":{{"input_tokens":10,"output_tokens":20}}}}"#
        ));
        let completed = events
            .iter()
            .find(|e| e.event_type == EventType::Completed)
            .expect("completed event present");
        assert_eq!(completed.data.get("tokens_in").unwrap(), "10");
        assert_eq!(completed.data.get("tokens_out").unwrap(), "20");
    }
}

#[test]
fn suspicious_token_count_emits_extra_progress_event_before_completed() {
    let tokens_in = CODEX_SUSPICIOUS_TOKEN_THRESHOLD + 1;
    let events = parse(&format!(
        r#"{{"type":"done","usage":{{"input_tokens":{tokens_in},"output_tokens":1}}}}"#
    ));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::Progress);
    assert_eq!(events[1].event_type, EventType::Completed);
}

#[test]
fn token_count_at_threshold_does_not_trigger_suspicious_event() {
    let events = parse(&format!(
        r#"{{"type":"done","usage":{{"input_tokens":{},"output_tokens":1}}}}"#,
        CODEX_SUSPICIOUS_TOKEN_THRESHOLD
    ));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Completed);
}

#[test]
fn error_emits_error_with_message() {
    let events = parse(r#"{"type":"error","message":"turn failed"}"#);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Error);
    assert_eq!(events[0].message, "turn failed");
}

#[test]
fn error_without_message_uses_default() {
    let events = parse(r#"{"type":"error"}"#);
    assert_eq!(events[0].message, "Agent reported an error");
}

#[test]
fn non_json_and_unknown_types_produce_nothing() {
    assert!(parse("plain text").is_empty());
    assert!(parse(r#"{"type":"unrelated"}"#).is_empty());
}
