//! Launches the child, wires pipes, enforces timeouts, and performs
//! graceful→forceful termination. The one component everything else in
//! this crate exists to support.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::cancel::CancelToken;
use crate::config::{AdapterConfig, DEFAULT_OVERALL_TIMEOUT};
use crate::error::{self, ExecError, ExecutionError, Termination};
use crate::event::{AgentEvent, Aggregator, EventType, EventValue};
use crate::parsers;
use crate::pipeline::{self, EventHandler, LogCallback, PipelineOptions};
use crate::process_group;
use crate::stream_config::{self, StreamConfig, StreamMethod};

/// Default grace period given to a child between the graceful signal and
/// the forceful kill.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// The full captured result of one execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout_bytes: Vec<u8>,
    pub stderr_bytes: Vec<u8>,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    fn empty() -> Self {
        Self {
            stdout_bytes: Vec::new(),
            stderr_bytes: Vec::new(),
            exit_code: -1,
            duration: Duration::ZERO,
        }
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout_bytes).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr_bytes).into_owned()
    }
}

/// A handle to the currently executing child for one adapter. An adapter
/// runs at most one process at a time.
struct ActiveProcess {
    pid: Option<u32>,
    started_at: Instant,
}

/// Executes one adapter's commands, enforcing the single-active-process
/// invariant and the timeout/termination contract.
pub struct Executor {
    config: AdapterConfig,
    active: Mutex<Option<ActiveProcess>>,
}

impl Executor {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Resolves the configured binary on `PATH` without running it.
    pub fn ping(&self) -> Result<(), ExecError> {
        let (binary, _) = resolve_command(&self.config.command)?;
        which::which(&binary)
            .map(|_| ())
            .map_err(|_| ExecError::NotFound(binary))
    }

    /// Non-streaming execution: stderr is buffered, and forwarded to
    /// `log_callback` line-by-line if set. No parser is consulted.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_command(
        &self,
        argv: &[String],
        stdin: Option<&[u8]>,
        work_dir: Option<&std::path::Path>,
        timeout: Option<Duration>,
        log_callback: Option<LogCallback>,
        cancel: Option<CancelToken>,
    ) -> (CommandResult, Option<ExecError>) {
        self.execute(argv, stdin, work_dir, timeout, None, None, log_callback, cancel)
            .await
    }

    /// Streaming execution: consults the stream-config table for this
    /// adapter's agent, injects the flags it calls for, and routes
    /// stdout (or a tailed log directory) through the agent's parser into
    /// `handler`.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_with_streaming(
        &self,
        argv: &[String],
        stdin: Option<&[u8]>,
        work_dir: Option<&std::path::Path>,
        timeout: Option<Duration>,
        handler: Option<EventHandler>,
        cancel: Option<CancelToken>,
    ) -> (CommandResult, Option<ExecError>) {
        let stream_config = stream_config::stream_config_for(&self.config.agent_name);
        self.execute(argv, stdin, work_dir, timeout, Some(stream_config), handler, None, cancel)
            .await
    }

    /// Signals the active child's process group; does not wait on exit.
    pub async fn graceful_kill(&self, grace_period: Duration) {
        let pid = {
            let active = self.active.lock().expect("executor mutex poisoned");
            active.as_ref().and_then(|p| p.pid)
        };
        if let Some(pid) = pid {
            process_group::graceful_kill(pid, grace_period).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        argv: &[String],
        stdin: Option<&[u8]>,
        work_dir: Option<&std::path::Path>,
        timeout: Option<Duration>,
        stream_config: Option<StreamConfig>,
        handler: Option<EventHandler>,
        log_callback: Option<LogCallback>,
        cancel: Option<CancelToken>,
    ) -> (CommandResult, Option<ExecError>) {
        let (binary, prefix_args) = match resolve_command(&self.config.command) {
            Ok(resolved) => resolved,
            Err(e) => return (CommandResult::empty(), Some(e)),
        };

        {
            let mut active = self.active.lock().expect("executor mutex poisoned");
            if active.is_some() {
                return (
                    CommandResult::empty(),
                    Some(ExecError::Validation(format!(
                        "adapter '{}' is already executing a command",
                        self.config.agent_name
                    ))),
                );
            }
            *active = Some(ActiveProcess {
                pid: None,
                started_at: Instant::now(),
            });
        }

        let result = self
            .execute_inner(
                &binary,
                &prefix_args,
                argv,
                stdin,
                work_dir,
                timeout,
                stream_config,
                handler,
                log_callback,
                cancel,
            )
            .await;

        let started_at = self
            .active
            .lock()
            .expect("executor mutex poisoned")
            .take()
            .map(|p| p.started_at)
            .unwrap_or_else(Instant::now);
        let duration = started_at.elapsed();

        match result {
            Ok((mut command_result, termination)) => {
                command_result.duration = duration;
                let err = match termination {
                    Some(Termination::Timeout(kind)) => Some(ExecError::Timeout(kind)),
                    Some(Termination::Canceled) => Some(ExecError::Canceled),
                    None if command_result.exit_code != 0 => Some(error::classify(
                        command_result.exit_code,
                        &command_result.stdout(),
                        &command_result.stderr(),
                    )),
                    None => None,
                };
                (command_result, err)
            }
            Err(e) => {
                let mut result = CommandResult::empty();
                result.duration = duration;
                (result, Some(e))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_inner(
        &self,
        binary: &str,
        prefix_args: &[String],
        argv: &[String],
        stdin: Option<&[u8]>,
        work_dir: Option<&std::path::Path>,
        timeout: Option<Duration>,
        stream_config: Option<StreamConfig>,
        handler: Option<EventHandler>,
        log_callback: Option<LogCallback>,
        cancel: Option<CancelToken>,
    ) -> Result<(CommandResult, Option<Termination>), ExecError> {
        let method = stream_config
            .as_ref()
            .map(|c| c.method)
            .unwrap_or(StreamMethod::None);

        let mut full_argv: Vec<String> = prefix_args.to_vec();
        full_argv.extend(self.config.extra_args.iter().cloned());
        full_argv.extend(argv.iter().cloned());

        let mut temp_dir = None;
        if let Some(config) = &stream_config {
            match method {
                StreamMethod::JsonStdout => full_argv.extend(config.streaming_argv()),
                StreamMethod::LogFile => {
                    let dir = tempfile::Builder::new()
                        .prefix("quorum-logs-")
                        .tempdir()
                        .map_err(|e| ExecError::Execution(ExecutionError::Network(e.to_string())))?;
                    if let Some(flag) = config.log_dir_flag {
                        full_argv.push(flag.to_string());
                        full_argv.push(dir.path().display().to_string());
                    }
                    if let (Some(flag), Some(value)) = (config.log_level_flag, config.log_level_value) {
                        full_argv.push(flag.to_string());
                        full_argv.push(value.to_string());
                    }
                    temp_dir = Some(dir);
                }
                StreamMethod::None => {}
            }
        }

        let mut cmd = Command::new(binary);
        cmd.args(&full_argv);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let resolved_work_dir = work_dir.map(PathBuf::from).or_else(|| self.config.work_dir.clone());
        if let Some(dir) = &resolved_work_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.config.extra_env {
            cmd.env(key, value);
        }

        process_group::isolate(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Execution(ExecutionError::Network(e.to_string())))?;

        {
            let mut active = self.active.lock().expect("executor mutex poisoned");
            if let Some(slot) = active.as_mut() {
                slot.pid = child.id();
            }
        }

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input)
                    .await
                    .map_err(|e| ExecError::Execution(ExecutionError::Network(e.to_string())))?;
            }
        }

        let grace_period = DEFAULT_GRACE_PERIOD;
        let overall_timeout_override = timeout.or(self.config.overall_timeout);
        let effective = error::effective_deadline(None, overall_timeout_override, DEFAULT_OVERALL_TIMEOUT);
        let overall_deadline = tokio::time::Instant::from_std(effective);

        let parser = parsers::parser_for(&self.config.agent_name);
        let command_display = std::iter::once(binary.to_string())
            .chain(full_argv.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let options = PipelineOptions {
            agent_name: self.config.agent_name.clone(),
            method,
            parser,
            handler: handler.clone(),
            log_callback,
            aggregator: Arc::new(Aggregator::new()),
            idle_timeout: self.config.idle_timeout,
            overall_deadline,
            grace_period,
            log_dir: temp_dir.as_ref().map(|d| d.path().to_path_buf()),
            command_display,
            cancel,
        };

        let outcome = pipeline::run(child, options)
            .await
            .map_err(|e| ExecError::Execution(ExecutionError::Network(e.to_string())))?;

        if let Some(dir) = temp_dir {
            let _ = dir.close();
        }

        let exit_code = outcome.exit_code.unwrap_or(-1);

        if let Some(handler) = &handler {
            let event = match outcome.termination {
                Some(Termination::Timeout(_)) => {
                    AgentEvent::new(EventType::Error, &self.config.agent_name, "Execution timed out")
                }
                Some(Termination::Canceled) => {
                    AgentEvent::new(EventType::Error, &self.config.agent_name, "Execution canceled")
                }
                None if exit_code != 0 => {
                    AgentEvent::new(EventType::Error, &self.config.agent_name, "Execution failed")
                }
                None => {
                    let started_at = self
                        .active
                        .lock()
                        .expect("executor mutex poisoned")
                        .as_ref()
                        .map(|p| p.started_at)
                        .unwrap_or_else(Instant::now);
                    let duration_ms = started_at.elapsed().as_millis() as i64;
                    AgentEvent::new(EventType::Completed, &self.config.agent_name, "Execution completed")
                        .with_data([("duration_ms", EventValue::from(duration_ms))])
                }
            };
            handler(event);
        }

        Ok((
            CommandResult {
                stdout_bytes: outcome.stdout_text.into_bytes(),
                stderr_bytes: outcome.stderr_text.into_bytes(),
                exit_code,
                duration: Duration::ZERO,
            },
            outcome.termination,
        ))
    }
}

/// Tokenizes the configured command by whitespace: the first token is the
/// executable, the remainder is prepended to argv. Fails validation on an
/// empty command.
fn resolve_command(command: &str) -> Result<(String, Vec<String>), ExecError> {
    let mut tokens = command.split_whitespace();
    let binary = tokens
        .next()
        .ok_or_else(|| ExecError::Validation("adapter command is empty".to_string()))?;
    let rest = tokens.map(str::to_string).collect();
    Ok((binary.to_string(), rest))
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
