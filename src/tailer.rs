//! Polls a directory for append-only `.log`/`.txt` files written by an
//! agent that traces to disk instead of stdout, feeding newly appended
//! lines through the agent's parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::watch;

use crate::event::{Aggregator, EventHandler};
use crate::parsers::StreamParser;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Mapping from a watched file's canonical path to the byte offset already
/// read. Never shrinks during a run; discarded when the tailer stops.
type SeenFiles = HashMap<PathBuf, u64>;

pub struct Tailer {
    watch_dir: PathBuf,
    agent_name: String,
    parser: &'static dyn StreamParser,
    aggregator: Arc<Aggregator>,
    handler: Option<EventHandler>,
}

impl Tailer {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        agent_name: impl Into<String>,
        parser: &'static dyn StreamParser,
        aggregator: Arc<Aggregator>,
        handler: Option<EventHandler>,
    ) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            agent_name: agent_name.into(),
            parser,
            aggregator,
            handler,
        }
    }

    /// Runs the poll loop until `stop_rx` reports `true` or its sender is
    /// dropped. Both are treated as a shutdown request, per the tailer's
    /// shutdown contract.
    pub async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let mut seen_files = SeenFiles::new();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&mut seen_files).await {
                        tracing::debug!(error = %e, dir = %self.watch_dir.display(), "tailer poll failed");
                    }
                }
                changed = stop_rx.changed() => {
                    match changed {
                        Ok(()) if *stop_rx.borrow() => break,
                        Err(_) => break,
                        Ok(()) => continue,
                    }
                }
            }
        }
    }

    async fn tick(&self, seen_files: &mut SeenFiles) -> std::io::Result<()> {
        let canonical_root = match tokio::fs::canonicalize(&self.watch_dir).await {
            Ok(root) => root,
            Err(_) => return Ok(()),
        };

        let mut entries = tokio::fs::read_dir(&self.watch_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_watched_extension(&path) {
                continue;
            }
            let Some(canonical) = confine(&path, &canonical_root).await else {
                continue;
            };
            let Ok(metadata) = tokio::fs::metadata(&canonical).await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let size = metadata.len();
            let last = *seen_files.get(&canonical).unwrap_or(&0);
            if size > last {
                if let Err(e) = self.read_new_lines(&canonical, last).await {
                    tracing::debug!(
                        error = %e,
                        agent = %self.agent_name,
                        file = %canonical.display(),
                        "failed reading tailed file"
                    );
                }
                seen_files.insert(canonical, size);
            } else {
                seen_files.entry(canonical).or_insert(0);
            }
        }
        Ok(())
    }

    async fn read_new_lines(&self, path: &Path, from_offset: u64) -> std::io::Result<()> {
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(from_offset)).await?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            for event in self.parser.parse_line(trimmed) {
                if let Some(gated) = self.aggregator.gate(event) {
                    if let Some(handler) = &self.handler {
                        handler(gated);
                    }
                }
            }
        }
        Ok(())
    }
}

fn has_watched_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("log") | Some("txt")
    )
}

/// Canonicalizes `path` and verifies it stays within `canonical_root`,
/// defeating a symlink that points outside the watched directory.
async fn confine(path: &Path, canonical_root: &Path) -> Option<PathBuf> {
    let canonical = tokio::fs::canonicalize(path).await.ok()?;
    if canonical.starts_with(canonical_root) {
        Some(canonical)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "tests/tailer_tests.rs"]
mod tests;
