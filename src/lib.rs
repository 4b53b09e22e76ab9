//! Core runtime for executing external AI coding-agent CLIs as child
//! processes, streaming their progress through a normalized event model,
//! and classifying their failures.
//!
//! This crate is deliberately narrow: it knows how to run an opaque
//! command-line program, read its stdout/stderr (or a log directory it
//! writes to), translate agent-specific output into [`event::AgentEvent`]s,
//! and terminate it cleanly. Everything else — HTTP transport, session
//! persistence, pricing, the CLI front-end, and config-file loading — lives
//! above this crate.

pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod parsers;
pub mod pipeline;
pub mod process_group;
pub mod stream_config;
pub mod tailer;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::AdapterConfig;
pub use error::{ExecError, ExecutionError, TimeoutKind};
pub use event::{AgentEvent, Aggregator, EventType};
pub use executor::{CommandResult, Executor};
pub use stream_config::{StreamConfig, StreamMethod};
