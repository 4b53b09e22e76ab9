//! Typed error boundary and the stderr/stdout classifier.
//!
//! Errors crossing this crate's public boundary are a hand-rolled enum with
//! manual `Display`/`std::error::Error` impls rather than a `thiserror`
//! derive. Internal fallible paths map directly into [`ExecError`] at the
//! point they cross into [`crate::executor`], rather than passing through an
//! intermediate error type.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Errors surfaced to callers of this crate's execute entry points.
#[derive(Debug, Clone)]
pub enum ExecError {
    /// The configured command path was missing or malformed.
    Validation(String),
    /// The configured binary could not be resolved on `PATH`.
    NotFound(String),
    /// The execution was terminated for exceeding a deadline.
    Timeout(TimeoutKind),
    /// The caller cancelled the execution before it completed.
    Canceled,
    /// The agent reported (or its exit implies) a rate limit.
    RateLimit(String),
    /// The agent reported an authentication/authorization failure.
    Auth(String),
    /// The agent's output exceeded a model or context-window limit.
    OutputTooLong(String),
    /// A failure that doesn't fit the categories above.
    Execution(ExecutionError),
}

/// Which timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The overall execution deadline elapsed.
    Overall,
    /// No output was observed for longer than the configured idle timeout.
    Idle,
}

/// Why an execution was terminated before the child exited on its own.
/// Both variants drive the same graceful→forceful kill sequence; they only
/// differ in how the result is classified back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Timeout(TimeoutKind),
    Canceled,
}

/// The generic `execution` error category from §7: a network failure, or a
/// nonzero exit with no more specific classification.
#[derive(Debug, Clone)]
pub enum ExecutionError {
    Network(String),
    CliError { exit_code: i32, message: String },
}

impl Display for ExecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::NotFound(command) => write!(f, "binary not found on PATH: {command}"),
            Self::Timeout(TimeoutKind::Overall) => write!(f, "execution timed out"),
            Self::Timeout(TimeoutKind::Idle) => write!(f, "execution timed out (idle)"),
            Self::Canceled => write!(f, "execution canceled"),
            Self::RateLimit(message) => write!(f, "rate limited: {message}"),
            Self::Auth(message) => write!(f, "authentication error: {message}"),
            Self::OutputTooLong(message) => write!(f, "output too long: {message}"),
            Self::Execution(inner) => write!(f, "{inner}"),
        }
    }
}

impl std::error::Error for ExecError {}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::CliError { exit_code, message } => {
                write!(f, "command exited with code {exit_code}: {message}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Substring families checked in priority order by [`classify`]. Matching is
/// case-insensitive; the first family with a hit wins.
const OUTPUT_TOO_LONG_MARKERS: &[&str] = &[
    "output token maximum",
    "too many output tokens",
    "max output limit",
    "maximum output reached",
    "response exceeded the limit",
    "context length exceeded",
    "maximum context window",
    "too many tokens in request",
];

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "too many requests", "429", "quota"];

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "authentication",
    "authorization",
    "forbidden",
    "api key",
    "invalid token",
    "oauth",
];

const NETWORK_MARKERS: &[&str] = &["connection", "network", "timeout", "unreachable"];

/// Classifies a failed execution's captured output into a typed error,
/// per the ordered priority list in the error classifier's contract.
///
/// `stdout` and `stderr` are searched together (stderr first, since agents
/// generally report failures there); `exit_code` is used only by the
/// `cli_error` fallback.
pub fn classify(exit_code: i32, stdout: &str, stderr: &str) -> ExecError {
    let haystack = format!("{stderr}\n{stdout}").to_lowercase();

    let max_tokens_exceeded = haystack.contains("max_tokens") && haystack.contains("exceeded");
    if max_tokens_exceeded || OUTPUT_TOO_LONG_MARKERS.iter().any(|m| haystack.contains(m)) {
        return ExecError::OutputTooLong(extract_message(stdout, stderr));
    }
    if RATE_LIMIT_MARKERS.iter().any(|m| haystack.contains(m)) {
        return ExecError::RateLimit(extract_message(stdout, stderr));
    }
    if AUTH_MARKERS.iter().any(|m| haystack.contains(m)) {
        return ExecError::Auth(extract_message(stdout, stderr));
    }
    if NETWORK_MARKERS.iter().any(|m| haystack.contains(m)) {
        return ExecError::Execution(ExecutionError::Network(extract_message(stdout, stderr)));
    }

    ExecError::Execution(ExecutionError::CliError {
        exit_code,
        message: extract_message(stdout, stderr),
    })
}

/// Best-effort message extraction for the `cli_error` fallback (and reused
/// by every other category, since they all want *some* human-readable
/// excerpt): the last JSON line with an `"error"` field; else the last
/// non-empty non-JSON line; else a fixed placeholder.
fn extract_message(stdout: &str, stderr: &str) -> String {
    let combined: Vec<&str> = stderr.lines().chain(stdout.lines()).collect();

    for line in combined.iter().rev() {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(message) = value.get("error").and_then(extract_error_text) {
                return message;
            }
        }
    }

    for line in combined.iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('{') {
            continue;
        }
        return trimmed.to_string();
    }

    "no error message captured".to_string()
}

fn extract_error_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(_) => value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Timeout bookkeeping shared by the executor and the pipeline's idle timer:
/// the effective deadline is `min(ctx_deadline, now + override_or_default)`.
pub fn effective_deadline(
    ctx_deadline: Option<std::time::Instant>,
    override_timeout: Option<Duration>,
    default_timeout: Duration,
) -> std::time::Instant {
    let from_timeout = std::time::Instant::now() + override_timeout.unwrap_or(default_timeout);
    match ctx_deadline {
        Some(deadline) => deadline.min(from_timeout),
        None => from_timeout,
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
