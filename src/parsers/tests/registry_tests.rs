use super::*;

#[test]
fn known_agents_resolve_to_a_parser_with_matching_name() {
    for agent in ["claude", "gemini", "codex", "copilot"] {
        let parser = parser_for(agent).unwrap_or_else(|| panic!("missing parser for {agent}"));
        assert_eq!(parser.agent_name(), agent);
    }
}

#[test]
fn unknown_agent_resolves_to_none() {
    assert!(parser_for("unknown-agent").is_none());
    assert!(parser_for("").is_none());
    assert!(parser_for("Claude").is_none());
}

#[test]
fn registry_has_exactly_the_four_known_agents() {
    assert_eq!(REGISTRY.len(), 4);
}
