use super::*;

#[test]
fn new_leaves_optional_fields_empty() {
    let config = AdapterConfig::new("claude", "claude");
    assert_eq!(config.agent_name, "claude");
    assert_eq!(config.command, "claude");
    assert!(config.extra_args.is_empty());
    assert!(config.work_dir.is_none());
    assert!(config.extra_env.is_empty());
    assert!(config.overall_timeout.is_none());
    assert!(config.idle_timeout.is_none());
}

#[test]
fn builder_methods_set_fields() {
    let config = AdapterConfig::new("copilot", "gh copilot")
        .with_extra_args(["--yes".to_string()])
        .with_work_dir("/tmp/work")
        .with_extra_env([("API_BASE".to_string(), "https://example".to_string())])
        .with_overall_timeout(Duration::from_secs(60))
        .with_idle_timeout(Duration::from_secs(5));

    assert_eq!(config.extra_args, vec!["--yes".to_string()]);
    assert_eq!(config.work_dir, Some(PathBuf::from("/tmp/work")));
    assert_eq!(
        config.extra_env.get("API_BASE"),
        Some(&"https://example".to_string())
    );
    assert_eq!(config.overall_timeout, Some(Duration::from_secs(60)));
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
}
