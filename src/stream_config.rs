//! Declarative per-agent description of how to enable streaming.
//!
//! A small static table, written once at compile time and read-only from
//! then on — the same "init-time-immutable registry" shape as
//! [`crate::parsers`]. Unknown agents default to [`StreamMethod::None`].

/// How an agent produces real-time output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMethod {
    /// No streaming; stdout/stderr are only buffered.
    None,
    /// The agent writes newline-delimited JSON event lines to stdout.
    JsonStdout,
    /// The agent writes event lines to rotating log files in a directory
    /// the executor controls.
    LogFile,
}

/// Per-agent streaming mechanism and the argv flags needed to enable it.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub method: StreamMethod,
    /// Flag name used to request the streaming output format, e.g.
    /// `--output-format`.
    pub output_format_flag: Option<&'static str>,
    /// Value passed to `output_format_flag`, e.g. `stream-json`.
    pub output_format_value: Option<&'static str>,
    /// Additional flags always required alongside streaming, e.g.
    /// `--verbose`.
    pub required_flags: Option<&'static [&'static str]>,
    /// Flag used to point the agent at a log directory, for `log_file`.
    pub log_dir_flag: Option<&'static str>,
    pub log_level_flag: Option<&'static str>,
    pub log_level_value: Option<&'static str>,
}

impl StreamConfig {
    const fn none() -> Self {
        Self {
            method: StreamMethod::None,
            output_format_flag: None,
            output_format_value: None,
            required_flags: None,
            log_dir_flag: None,
            log_level_flag: None,
            log_level_value: None,
        }
    }

    const fn json_stdout(
        output_format_flag: &'static str,
        output_format_value: &'static str,
        required_flags: &'static [&'static str],
    ) -> Self {
        Self {
            method: StreamMethod::JsonStdout,
            output_format_flag: Some(output_format_flag),
            output_format_value: Some(output_format_value),
            required_flags: Some(required_flags),
            log_dir_flag: None,
            log_level_flag: None,
            log_level_value: None,
        }
    }

    const fn log_file(
        log_dir_flag: &'static str,
        log_level_flag: &'static str,
        log_level_value: &'static str,
    ) -> Self {
        Self {
            method: StreamMethod::LogFile,
            output_format_flag: None,
            output_format_value: None,
            required_flags: None,
            log_dir_flag: Some(log_dir_flag),
            log_level_flag: Some(log_level_flag),
            log_level_value: Some(log_level_value),
        }
    }

    /// Renders the flags this config contributes to a child's argv, in a
    /// stable order: output-format flag/value, then required flags.
    /// `log_file` configs contribute nothing here — the executor appends
    /// the log-directory flags itself once it has created the temp
    /// directory (see [`crate::executor`]).
    pub fn streaming_argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if let (Some(flag), Some(value)) = (self.output_format_flag, self.output_format_value) {
            argv.push(flag.to_string());
            argv.push(value.to_string());
        }
        if let Some(flags) = self.required_flags {
            argv.extend(flags.iter().map(|f| f.to_string()));
        }
        argv
    }
}

const STREAM_TABLE: &[(&str, StreamConfig)] = &[
    (
        "claude",
        StreamConfig::json_stdout("--output-format", "stream-json", &["--verbose"]),
    ),
    (
        "gemini",
        StreamConfig::json_stdout("--output-format", "stream-json", &[]),
    ),
    (
        "codex",
        StreamConfig::json_stdout("--json", "true", &[]),
    ),
    (
        "copilot",
        StreamConfig::log_file("--log-dir", "--log-level", "all"),
    ),
];

/// Looks up the streaming config for `agent`, defaulting to
/// `{method: none}` for anything not in the table.
pub fn stream_config_for(agent: &str) -> StreamConfig {
    STREAM_TABLE
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, config)| config.clone())
        .unwrap_or_else(StreamConfig::none)
}

#[cfg(test)]
#[path = "tests/stream_config_tests.rs"]
mod tests;
