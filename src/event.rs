//! The normalized agent event and the aggregator that rate-limits it.
//!
//! Every stream parser (see [`crate::parsers`]) and the executor itself
//! produce [`AgentEvent`]s. The [`Aggregator`] sits between production and
//! delivery: it never alters an event's contents, it only decides whether
//! the event is delivered at all, and it coalesces `chunk` bodies into
//! fewer, larger deliveries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Maximum length, in characters, of a `message` or a single `data` value
/// before truncation.
const MAX_VALUE_LEN: usize = 200;

/// `data` maps with more entries than this are serialized to JSON and
/// truncated as a single string instead of kept as a structured map.
const MAX_DATA_ENTRIES: usize = 4;

/// Minimum interval between deliveries of the same `(type, agent)` pair,
/// for event types that are not exempt from rate limiting.
const MIN_EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Window over which `chunk` bodies are coalesced per agent.
const CHUNK_COALESCE_WINDOW: Duration = Duration::from_millis(200);

/// The kind of progress an [`AgentEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Started,
    Progress,
    ToolUse,
    Thinking,
    Chunk,
    Completed,
    Error,
}

impl EventType {
    /// Event types that always pass the aggregator, regardless of timing.
    fn bypasses_rate_limit(self) -> bool {
        matches!(
            self,
            EventType::Started | EventType::ToolUse | EventType::Completed | EventType::Error
        )
    }
}

/// A value attached to an event under a short string key.
///
/// Modeled as a closed enum rather than an arbitrary JSON value so that
/// parsers can't accidentally attach deeply nested, unbounded structures —
/// anything structured enough to need that is serialized and truncated like
/// any other oversized value.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Text(String),
    Int(i64),
    Bool(bool),
    /// A nested structure, e.g. a parsed JSON fragment. Truncated the same
    /// way as `Text` once serialized.
    Json(serde_json::Value),
}

impl From<&str> for EventValue {
    fn from(s: &str) -> Self {
        EventValue::Text(s.to_string())
    }
}

impl From<String> for EventValue {
    fn from(s: String) -> Self {
        EventValue::Text(s)
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}

impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}

/// Monotonic + wall-clock timestamp carried by every event.
#[derive(Debug, Clone, Copy)]
pub struct EventTimestamp {
    pub monotonic: Instant,
    pub wall_clock: DateTime<Utc>,
}

impl EventTimestamp {
    fn now() -> Self {
        Self {
            monotonic: Instant::now(),
            wall_clock: Utc::now(),
        }
    }
}

/// A sink that a streaming execution delivers normalized events to, as
/// they're gated past the aggregator. Shared by the pipeline's stdout/stderr
/// readers and the log-file tailer — both feed the same handler.
pub type EventHandler = std::sync::Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// An immutable record describing a point in an agent's execution.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub event_type: EventType,
    pub agent: String,
    pub message: String,
    pub timestamp: EventTimestamp,
    pub data: HashMap<String, String>,
}

impl AgentEvent {
    /// Creates a new event. `agent` must be non-empty — every event carries
    /// an agent identifier, per the data model's invariant.
    pub fn new(event_type: EventType, agent: impl Into<String>, message: impl Into<String>) -> Self {
        let agent = agent.into();
        debug_assert!(!agent.is_empty(), "AgentEvent::agent must be non-empty");
        let message = truncate_str(&message.into());
        Self {
            event_type,
            agent,
            message,
            timestamp: EventTimestamp::now(),
            data: HashMap::new(),
        }
    }

    /// Attaches data to the event, applying the truncation rule to each
    /// value and collapsing the whole map to a truncated JSON string if it
    /// has more than [`MAX_DATA_ENTRIES`] entries.
    pub fn with_data<I, K>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, EventValue)>,
        K: Into<String>,
    {
        let entries: Vec<(String, EventValue)> =
            data.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if entries.len() > MAX_DATA_ENTRIES {
            let obj: serde_json::Map<String, serde_json::Value> = entries
                .into_iter()
                .map(|(k, v)| (k, value_to_json(&v)))
                .collect();
            let serialized = serde_json::Value::Object(obj).to_string();
            self.data
                .insert("_overflow".to_string(), truncate_str(&serialized));
            return self;
        }

        for (key, value) in entries {
            self.data.insert(key, truncate_value(&value));
        }
        self
    }
}

fn value_to_json(v: &EventValue) -> serde_json::Value {
    match v {
        EventValue::Text(s) => serde_json::Value::String(s.clone()),
        EventValue::Int(n) => serde_json::Value::from(*n),
        EventValue::Bool(b) => serde_json::Value::Bool(*b),
        EventValue::Json(j) => j.clone(),
    }
}

fn truncate_value(v: &EventValue) -> String {
    match v {
        EventValue::Text(s) => truncate_str(s),
        EventValue::Int(n) => n.to_string(),
        EventValue::Bool(b) => b.to_string(),
        EventValue::Json(j) => truncate_str(&j.to_string()),
    }
}

fn truncate_str(s: &str) -> String {
    if s.chars().count() <= MAX_VALUE_LEN {
        return s.to_string();
    }
    let head: String = s.chars().take(MAX_VALUE_LEN).collect();
    format!("{head}...[truncated]")
}

/// Per-agent chunk accumulation state.
struct ChunkBuffer {
    text: String,
    last_emit: Option<Instant>,
}

impl ChunkBuffer {
    fn new() -> Self {
        Self {
            text: String::new(),
            last_emit: None,
        }
    }
}

/// Rate-limiter and chunk-coalescer applied uniformly to the event stream
/// before delivery to the caller's handler.
///
/// `ShouldEmit`/`BufferChunk`/`FlushChunks` never mutate or inspect the
/// event's contents — they only gate delivery. The aggregator is safe to
/// share between concurrent readers (stdout/stderr) because its state is
/// mutex-guarded internally; a single-reader pipeline pays a lock that is
/// never contended.
pub struct Aggregator {
    last_emit: Mutex<HashMap<(EventType, String), Instant>>,
    chunks: Mutex<HashMap<String, ChunkBuffer>>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            last_emit: Mutex::new(HashMap::new()),
            chunks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `event` must be delivered to the handler now.
    pub fn should_emit(&self, event: &AgentEvent) -> bool {
        let key = (event.event_type, event.agent.clone());
        let now = Instant::now();
        let mut last_emit = self.last_emit.lock().expect("aggregator mutex poisoned");

        if event.event_type.bypasses_rate_limit() {
            last_emit.insert(key, now);
            return true;
        }

        let emit = match last_emit.get(&key) {
            Some(prev) => now.duration_since(*prev) >= MIN_EMIT_INTERVAL,
            None => true,
        };
        if emit {
            last_emit.insert(key, now);
        }
        emit
    }

    /// Accumulates `text` into the per-agent chunk buffer and returns
    /// `(flushed_text, should_emit)`. `should_emit` is true on the first
    /// chunk seen for this agent, or once [`CHUNK_COALESCE_WINDOW`] has
    /// elapsed since the last flush; the flushed text is the full buffer
    /// contents accumulated since the last flush, and the buffer is
    /// cleared when flushed.
    pub fn buffer_chunk(&self, agent: &str, text: &str) -> (String, bool) {
        let mut chunks = self.chunks.lock().expect("aggregator mutex poisoned");
        let buffer = chunks
            .entry(agent.to_string())
            .or_insert_with(ChunkBuffer::new);
        buffer.text.push_str(text);

        let now = Instant::now();
        let should_emit = match buffer.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= CHUNK_COALESCE_WINDOW,
        };

        if should_emit {
            buffer.last_emit = Some(now);
            (std::mem::take(&mut buffer.text), true)
        } else {
            (String::new(), false)
        }
    }

    /// Empties and returns the chunk buffer for `agent`. Called at
    /// completion so no trailing partial chunk is lost.
    pub fn flush_chunks(&self, agent: &str) -> String {
        let mut chunks = self.chunks.lock().expect("aggregator mutex poisoned");
        chunks
            .get_mut(agent)
            .map(|b| std::mem::take(&mut b.text))
            .unwrap_or_default()
    }

    /// Applies the aggregator's full gating policy to one event: `chunk`
    /// bodies are coalesced via [`Self::buffer_chunk`] and only returned
    /// once the coalescing window allows it; every other type goes through
    /// [`Self::should_emit`] unchanged. Readers (pipeline, tailer) should
    /// call this instead of the lower-level primitives directly.
    pub fn gate(&self, event: AgentEvent) -> Option<AgentEvent> {
        if event.event_type == EventType::Chunk {
            let (flushed, should_emit) = self.buffer_chunk(&event.agent, &event.message);
            if should_emit && !flushed.is_empty() {
                let mut event = event;
                event.message = flushed;
                Some(event)
            } else {
                None
            }
        } else if self.should_emit(&event) {
            Some(event)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/event_tests.rs"]
mod tests;
