use std::fs;
use std::sync::Mutex;

use tokio::sync::watch;

use super::*;
use crate::parsers::parser_for;

fn collecting_handler() -> (EventHandler, Arc<Mutex<Vec<AgentEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let handler: EventHandler = Arc::new(move |event| sink.lock().unwrap().push(event));
    (handler, events)
}

#[tokio::test]
async fn tick_reads_newly_appended_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("run.log");
    fs::write(&log_path, "Executing: ls\n").expect("write log");

    let (handler, events) = collecting_handler();
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        Some(handler),
    );

    let mut seen_files = SeenFiles::new();
    tailer.tick(&mut seen_files).await.expect("tick");

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].event_type, crate::event::EventType::ToolUse);
    assert_eq!(seen_files.len(), 1);
}

#[tokio::test]
async fn seen_files_offset_is_monotonic_and_not_reread() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("run.log");
    fs::write(&log_path, "Executing: ls\n").expect("write log");

    let (handler, events) = collecting_handler();
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        Some(handler),
    );

    let mut seen_files = SeenFiles::new();
    tailer.tick(&mut seen_files).await.expect("first tick");
    let offset_after_first = *seen_files.values().next().unwrap();

    // No growth: a second tick must not re-deliver the same line.
    tailer.tick(&mut seen_files).await.expect("second tick");
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(*seen_files.values().next().unwrap(), offset_after_first);

    // Appending more content only yields the new line.
    use std::io::Write;
    let mut file = fs::OpenOptions::new().append(true).open(&log_path).unwrap();
    writeln!(file, "Running tests").unwrap();
    drop(file);

    tailer.tick(&mut seen_files).await.expect("third tick");
    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert!(*seen_files.values().next().unwrap() > offset_after_first);
}

#[tokio::test]
async fn non_log_extensions_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("notes.md"), "Executing: ls\n").expect("write");

    let (handler, events) = collecting_handler();
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        Some(handler),
    );

    let mut seen_files = SeenFiles::new();
    tailer.tick(&mut seen_files).await.expect("tick");
    assert!(events.lock().unwrap().is_empty());
    assert!(seen_files.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_escaping_watch_dir_is_never_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let outside = tempfile::NamedTempFile::new().expect("outside file");
    fs::write(outside.path(), "Executing: rm -rf /\n").expect("write outside");

    let evil = dir.path().join("evil.log");
    std::os::unix::fs::symlink(outside.path(), &evil).expect("symlink");

    let (handler, events) = collecting_handler();
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        Some(handler),
    );

    let mut seen_files = SeenFiles::new();
    tailer.tick(&mut seen_files).await.expect("tick");

    assert!(events.lock().unwrap().is_empty());
    assert!(seen_files.is_empty());
}

#[tokio::test]
async fn run_stops_when_stop_channel_reports_true() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        None,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(tailer.run(stop_rx));

    stop_tx.send(true).expect("send stop");
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("tailer stopped promptly")
        .expect("join ok");
}

#[tokio::test]
async fn run_stops_when_stop_sender_is_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tailer = Tailer::new(
        dir.path(),
        "copilot",
        parser_for("copilot").unwrap(),
        Arc::new(Aggregator::new()),
        None,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(tailer.run(stop_rx));

    drop(stop_tx);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("tailer stopped promptly")
        .expect("join ok");
}
