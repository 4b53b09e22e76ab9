use super::*;

#[test]
fn known_json_stdout_agents_resolve_correctly() {
    let claude = stream_config_for("claude");
    assert_eq!(claude.method, StreamMethod::JsonStdout);
    assert_eq!(claude.output_format_flag, Some("--output-format"));
    assert_eq!(claude.output_format_value, Some("stream-json"));
    assert_eq!(claude.streaming_argv(), vec!["--output-format", "stream-json", "--verbose"]);

    let gemini = stream_config_for("gemini");
    assert_eq!(gemini.method, StreamMethod::JsonStdout);

    let codex = stream_config_for("codex");
    assert_eq!(codex.method, StreamMethod::JsonStdout);
}

#[test]
fn copilot_resolves_to_log_file() {
    let copilot = stream_config_for("copilot");
    assert_eq!(copilot.method, StreamMethod::LogFile);
    assert_eq!(copilot.log_dir_flag, Some("--log-dir"));
    assert_eq!(copilot.log_level_flag, Some("--log-level"));
    assert_eq!(copilot.log_level_value, Some("all"));
    // log_file configs don't contribute to the ordinary argv path.
    assert!(copilot.streaming_argv().is_empty());
}

#[test]
fn unknown_agent_defaults_to_none() {
    let config = stream_config_for("some-future-agent");
    assert_eq!(config.method, StreamMethod::None);
    assert!(config.streaming_argv().is_empty());
}
