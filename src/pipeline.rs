//! Concurrent stdout/stderr readers, the idle timer, and the topology
//! switch between the three streaming methods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::{Termination, TimeoutKind};
use crate::event::{AgentEvent, Aggregator, EventType, EventValue};
use crate::parsers::StreamParser;
use crate::process_group;
use crate::stream_config::StreamMethod;
use crate::tailer::Tailer;

/// Larger than the default 64 KiB line buffer, to accommodate big JSON
/// deltas on a single line.
pub const MAX_STDOUT_LINE_BYTES: usize = 1024 * 1024;

/// stderr heuristic events carry the triggering line truncated to this
/// many characters.
const STDERR_EVENT_MESSAGE_LEN: usize = 50;

const TOOL_USE_MARKERS: &[&str] = &[
    "reading", "writing", "executing", "running", "calling", "bash:", "tool:",
];
const THINKING_MARKERS: &[&str] = &["thinking", "reasoning", "considering", "evaluating"];

pub type EventHandler = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// A stderr log sink independent of the normalized event stream — set by
/// `ExecuteCommand` callers who want raw lines as they arrive, regardless
/// of streaming method.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// What the pipeline needs to drive one streamed child to completion.
pub struct PipelineOptions {
    pub agent_name: String,
    pub method: StreamMethod,
    pub parser: Option<&'static dyn StreamParser>,
    pub handler: Option<EventHandler>,
    pub log_callback: Option<LogCallback>,
    pub aggregator: Arc<Aggregator>,
    pub idle_timeout: Option<Duration>,
    pub overall_deadline: Instant,
    pub grace_period: Duration,
    pub log_dir: Option<std::path::PathBuf>,
    pub command_display: String,
    pub cancel: Option<CancelToken>,
}

pub struct PipelineOutcome {
    pub stdout_text: String,
    pub stderr_text: String,
    pub exit_code: Option<i32>,
    pub termination: Option<Termination>,
}

/// Drives `child` to completion according to `opts`, emitting events
/// through the handler as lines arrive. Always returns whatever was
/// captured, even when the child was killed for timing out.
pub async fn run(mut child: Child, opts: PipelineOptions) -> std::io::Result<PipelineOutcome> {
    let pid = child.id();

    emit_started(&opts);

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let activity = Arc::new(Notify::new());

    let stdout_task: tokio::task::JoinHandle<String> = match opts.method {
        StreamMethod::JsonStdout => {
            let parser = opts
                .parser
                .expect("json_stdout streaming requires a registered parser");
            tokio::spawn(read_json_stdout(
                stdout.expect("stdout piped"),
                parser,
                opts.agent_name.clone(),
                Arc::clone(&opts.aggregator),
                opts.handler.clone(),
                Arc::clone(&activity),
            ))
        }
        StreamMethod::None | StreamMethod::LogFile => tokio::spawn(read_raw(
            stdout.expect("stdout piped"),
            Arc::clone(&activity),
        )),
    };

    let emit_stderr_heuristics = opts.method == StreamMethod::JsonStdout;
    let stderr_task = tokio::spawn(read_stderr(
        stderr.expect("stderr piped"),
        opts.agent_name.clone(),
        Arc::clone(&opts.aggregator),
        opts.handler.clone(),
        opts.log_callback.clone(),
        emit_stderr_heuristics,
        Arc::clone(&activity),
    ));

    let tailer_stop = match (&opts.method, &opts.log_dir) {
        (StreamMethod::LogFile, Some(log_dir)) => {
            let (stop_tx, stop_rx) = watch::channel(false);
            let tailer = Tailer::new(
                log_dir.clone(),
                opts.agent_name.clone(),
                opts.parser.expect("log_file streaming requires a parser"),
                Arc::clone(&opts.aggregator),
                opts.handler.clone(),
            );
            let tailer_task = tokio::spawn(tailer.run(stop_rx));
            Some((stop_tx, tailer_task))
        }
        _ => None,
    };

    let idle_fired = Arc::new(AtomicBool::new(false));
    let idle_task = opts.idle_timeout.map(|idle_timeout| {
        tokio::spawn(idle_timer(
            Arc::clone(&activity),
            idle_timeout,
            pid,
            opts.grace_period,
            Arc::clone(&idle_fired),
        ))
    });

    let mut wait_task = tokio::spawn(async move { child.wait().await });
    let mut cancel = opts.cancel;

    let termination;
    let wait_result = tokio::select! {
        res = &mut wait_task => {
            termination = if idle_fired.load(Ordering::SeqCst) {
                Some(Termination::Timeout(TimeoutKind::Idle))
            } else {
                None
            };
            res
        }
        _ = tokio::time::sleep_until(opts.overall_deadline) => {
            termination = Some(Termination::Timeout(TimeoutKind::Overall));
            if let Some(pid) = pid {
                process_group::graceful_kill(pid, opts.grace_period).await;
            }
            wait_task.await
        }
        _ = wait_canceled(&mut cancel) => {
            termination = Some(Termination::Canceled);
            if let Some(pid) = pid {
                process_group::graceful_kill(pid, opts.grace_period).await;
            }
            wait_task.await
        }
    };

    if let Some(idle_task) = idle_task {
        idle_task.abort();
    }

    if let Some((stop_tx, tailer_task)) = tailer_stop {
        let _ = stop_tx.send(true);
        let _ = tailer_task.await;
    }

    let stdout_text = stdout_task.await.unwrap_or_default();
    let stderr_text = stderr_task.await.unwrap_or_default();

    let exit_code = match wait_result {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => return Err(e),
        Err(join_err) => {
            return Err(std::io::Error::other(format!(
                "child waiter task failed: {join_err}"
            )))
        }
    };

    Ok(PipelineOutcome {
        stdout_text,
        stderr_text,
        exit_code,
        termination,
    })
}

/// Resolves when `cancel` fires; never resolves if there is no token, so it
/// never wins the `tokio::select!` race in that case.
async fn wait_canceled(cancel: &mut Option<CancelToken>) {
    match cancel {
        Some(token) => token.canceled().await,
        None => std::future::pending().await,
    }
}

/// Emits `{started, data: {command}}` per the resolved open question: only
/// when a handler is set *and* the stream method isn't `none`.
fn emit_started(opts: &PipelineOptions) {
    if opts.method == StreamMethod::None {
        return;
    }
    let Some(handler) = &opts.handler else {
        return;
    };
    let event = AgentEvent::new(EventType::Started, &opts.agent_name, "Starting execution")
        .with_data([("command", EventValue::from(opts.command_display.clone()))]);
    if let Some(gated) = opts.aggregator.gate(event) {
        handler(gated);
    }
}

async fn read_json_stdout(
    stdout: ChildStdout,
    parser: &'static dyn StreamParser,
    agent: String,
    aggregator: Arc<Aggregator>,
    handler: Option<EventHandler>,
    activity: Arc<Notify>,
) -> String {
    let mut reader = BufReader::new(stdout);
    let mut text = String::new();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                activity.notify_one();
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if trimmed.is_empty() {
                    continue;
                }
                let capped = cap_line(trimmed);
                for event in parser.parse_line(capped) {
                    if let Some(gated) = aggregator.gate(event) {
                        if let Some(handler) = &handler {
                            handler(gated);
                        }
                    }
                }
                if let Some(extracted) = parser.extract_text(capped) {
                    text.push_str(&extracted);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, agent, "stdout reader ended early");
                break;
            }
        }
    }

    if let Some(handler) = &handler {
        let flushed = aggregator.flush_chunks(&agent);
        if !flushed.is_empty() {
            handler(AgentEvent::new(EventType::Chunk, &agent, flushed));
        }
    }

    text
}

/// Reads stderr line-by-line, always accumulating the full text and
/// forwarding each line to `log_callback` if set. Heuristic `tool_use`/
/// `thinking` events are only derived when `emit_heuristics` is true —
/// the `json_stdout` topology, per the streaming pipeline's contract; the
/// `none` and `log_file` topologies buffer stderr without deriving events
/// from it.
#[allow(clippy::too_many_arguments)]
async fn read_stderr(
    stderr: ChildStderr,
    agent: String,
    aggregator: Arc<Aggregator>,
    handler: Option<EventHandler>,
    log_callback: Option<LogCallback>,
    emit_heuristics: bool,
    activity: Arc<Notify>,
) -> String {
    let mut reader = BufReader::new(stderr);
    let mut buffer = String::new();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                activity.notify_one();
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(trimmed);

                if let Some(callback) = &log_callback {
                    callback(trimmed);
                }

                if emit_heuristics {
                    if let Some(event) = stderr_heuristic_event(&agent, trimmed) {
                        if let Some(gated) = aggregator.gate(event) {
                            if let Some(handler) = &handler {
                                handler(gated);
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, agent, "stderr reader ended early");
                break;
            }
        }
    }

    buffer
}

/// Reads raw bytes without line parsing, for the `none` and `log_file`
/// topologies where stdout carries no event stream.
async fn read_raw(stdout: ChildStdout, activity: Arc<Notify>) -> String {
    let mut reader = BufReader::new(stdout);
    let mut buffer = String::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                activity.notify_one();
                buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
            Err(e) => {
                tracing::debug!(error = %e, "raw stdout reader ended early");
                break;
            }
        }
    }
    buffer
}

fn stderr_heuristic_event(agent: &str, line: &str) -> Option<AgentEvent> {
    if line.trim().is_empty() {
        return None;
    }
    let lower = line.to_lowercase();
    let message = truncate_chars(line, STDERR_EVENT_MESSAGE_LEN);
    if TOOL_USE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Some(AgentEvent::new(EventType::ToolUse, agent, message))
    } else if THINKING_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Some(AgentEvent::new(EventType::Thinking, agent, message))
    } else {
        None
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Caps a line to [`MAX_STDOUT_LINE_BYTES`] at a char boundary, using
/// `str::get` rather than range-indexing to stay panic-free on multi-byte
/// boundaries.
fn cap_line(line: &str) -> &str {
    if line.len() <= MAX_STDOUT_LINE_BYTES {
        return line;
    }
    let mut end = MAX_STDOUT_LINE_BYTES;
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    line.get(..end).unwrap_or("")
}

async fn idle_timer(
    activity: Arc<Notify>,
    idle_timeout: Duration,
    pid: Option<u32>,
    grace_period: Duration,
    fired: Arc<AtomicBool>,
) {
    loop {
        match tokio::time::timeout(idle_timeout, activity.notified()).await {
            Ok(()) => continue,
            Err(_) => {
                fired.store(true, Ordering::SeqCst);
                if let Some(pid) = pid {
                    process_group::graceful_kill(pid, grace_period).await;
                }
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
