use super::*;
use std::thread::sleep;

#[test]
fn bypass_types_always_emit() {
    let agg = Aggregator::new();
    for event_type in [
        EventType::Started,
        EventType::ToolUse,
        EventType::Completed,
        EventType::Error,
    ] {
        let e1 = AgentEvent::new(event_type, "claude", "first");
        assert!(agg.should_emit(&e1));
        let e2 = AgentEvent::new(event_type, "claude", "second");
        assert!(agg.should_emit(&e2), "{:?} must never be rate-limited", event_type);
    }
}

#[test]
fn progress_events_within_100ms_are_rate_limited() {
    let agg = Aggregator::new();
    let e1 = AgentEvent::new(EventType::Progress, "claude", "p1");
    let e2 = AgentEvent::new(EventType::Progress, "claude", "p2");
    assert!(agg.should_emit(&e1));
    assert!(!agg.should_emit(&e2));
}

#[test]
fn progress_events_are_keyed_by_agent_and_type() {
    let agg = Aggregator::new();
    assert!(agg.should_emit(&AgentEvent::new(EventType::Progress, "claude", "p")));
    // Different agent, same type: not affected by claude's rate limit.
    assert!(agg.should_emit(&AgentEvent::new(EventType::Progress, "codex", "p")));
    // Different type, same agent: not affected either.
    assert!(agg.should_emit(&AgentEvent::new(EventType::Thinking, "claude", "t")));
}

#[test]
fn progress_events_survive_after_window_elapses() {
    let agg = Aggregator::new();
    assert!(agg.should_emit(&AgentEvent::new(EventType::Progress, "claude", "p1")));
    sleep(Duration::from_millis(110));
    assert!(agg.should_emit(&AgentEvent::new(EventType::Progress, "claude", "p2")));
}

#[test]
fn first_chunk_always_emits() {
    let agg = Aggregator::new();
    let (flushed, should_emit) = agg.buffer_chunk("claude", "hello");
    assert!(should_emit);
    assert_eq!(flushed, "hello");
}

#[test]
fn chunk_coalesces_within_window() {
    let agg = Aggregator::new();
    let (_, first) = agg.buffer_chunk("claude", "a");
    assert!(first);
    let (flushed, should_emit) = agg.buffer_chunk("claude", "b");
    assert!(!should_emit);
    assert_eq!(flushed, "");
}

#[test]
fn chunk_flushes_after_window_elapses() {
    let agg = Aggregator::new();
    agg.buffer_chunk("claude", "a");
    agg.buffer_chunk("claude", "b");
    sleep(Duration::from_millis(210));
    let (flushed, should_emit) = agg.buffer_chunk("claude", "c");
    assert!(should_emit);
    assert_eq!(flushed, "abc");
}

#[test]
fn flush_chunks_empties_buffer() {
    let agg = Aggregator::new();
    agg.buffer_chunk("claude", "partial");
    // Force non-emit on the next call by checking immediate re-buffer:
    let leftover = agg.flush_chunks("claude");
    assert!(leftover.is_empty() || leftover == "partial");
    assert_eq!(agg.flush_chunks("claude"), "");
}

#[test]
fn event_requires_nonempty_agent_in_debug_builds() {
    let event = AgentEvent::new(EventType::Started, "claude", "hi");
    assert_eq!(event.agent, "claude");
}

#[test]
fn long_message_is_truncated() {
    let long = "x".repeat(500);
    let event = AgentEvent::new(EventType::Progress, "claude", long);
    assert!(event.message.ends_with("...[truncated]"));
    assert_eq!(event.message.chars().count(), MAX_VALUE_LEN + "...[truncated]".chars().count());
}

#[test]
fn short_message_is_untouched() {
    let event = AgentEvent::new(EventType::Progress, "claude", "hi there");
    assert_eq!(event.message, "hi there");
}

#[test]
fn data_value_over_200_chars_is_truncated() {
    let long_value = "y".repeat(300);
    let event = AgentEvent::new(EventType::ToolUse, "claude", "msg")
        .with_data([("tool", EventValue::from(long_value.as_str()))]);
    let stored = event.data.get("tool").unwrap();
    assert!(stored.ends_with("...[truncated]"));
}

#[test]
fn data_map_over_4_entries_is_collapsed_and_truncated() {
    let event = AgentEvent::new(EventType::ToolUse, "claude", "msg").with_data([
        ("a", EventValue::from("1")),
        ("b", EventValue::from("2")),
        ("c", EventValue::from("3")),
        ("d", EventValue::from("4")),
        ("e", EventValue::from("5")),
    ]);
    assert_eq!(event.data.len(), 1);
    assert!(event.data.contains_key("_overflow"));
}

#[test]
fn data_map_with_4_entries_stays_structured() {
    let event = AgentEvent::new(EventType::ToolUse, "claude", "msg").with_data([
        ("a", EventValue::from("1")),
        ("b", EventValue::from("2")),
        ("c", EventValue::from("3")),
        ("d", EventValue::from("4")),
    ]);
    assert_eq!(event.data.len(), 4);
    assert!(!event.data.contains_key("_overflow"));
}

#[test]
fn gate_passes_bypass_types_through_unchanged() {
    let agg = Aggregator::new();
    let event = AgentEvent::new(EventType::Completed, "claude", "done");
    let message = event.message.clone();
    let gated = agg.gate(event).expect("completed always passes");
    assert_eq!(gated.message, message);
}

#[test]
fn gate_coalesces_chunks_like_buffer_chunk() {
    let agg = Aggregator::new();
    let first = agg.gate(AgentEvent::new(EventType::Chunk, "claude", "a"));
    assert_eq!(first.unwrap().message, "a");
    let second = agg.gate(AgentEvent::new(EventType::Chunk, "claude", "b"));
    assert!(second.is_none());
    sleep(Duration::from_millis(210));
    let third = agg.gate(AgentEvent::new(EventType::Chunk, "claude", "c"));
    assert_eq!(third.unwrap().message, "bc");
}

#[test]
fn gate_rate_limits_progress_like_should_emit() {
    let agg = Aggregator::new();
    assert!(agg.gate(AgentEvent::new(EventType::Progress, "claude", "p1")).is_some());
    assert!(agg.gate(AgentEvent::new(EventType::Progress, "claude", "p2")).is_none());
}

#[test]
fn aggregator_never_mutates_event_contents() {
    let agg = Aggregator::new();
    let event = AgentEvent::new(EventType::Completed, "claude", "done")
        .with_data([("tokens_out", EventValue::from(42i64))]);
    let message_before = event.message.clone();
    let data_before = event.data.clone();
    assert!(agg.should_emit(&event));
    assert_eq!(event.message, message_before);
    assert_eq!(event.data, data_before);
}
