use todovault::error::Error;
use todovault::output::{error_kind, format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("todovault task add: 1234");
    human.push_summary("group", "default");
    human.push_detail("[ ] P1 write tests (1234)");
    human.push_warning("auth.password not set");
    human.push_next_step("todovault task done 1234");

    let rendered = format_human(&human);
    assert!(rendered.contains("todovault task add: 1234"));
    assert!(rendered.starts_with("todovault task add: 1234\n  group: default"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("- [ ] P1 write tests (1234)"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("- auth.password not set"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- todovault task done 1234"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("todovault group list: 1 group(s)");
    let rendered = format_human(&human);
    assert_eq!(rendered, "todovault group list: 1 group(s)");
}

#[test]
fn error_kinds_follow_exit_codes() {
    assert_eq!(error_kind(&Error::validation("text", "x")), "user_error");
    assert_eq!(error_kind(&Error::DefaultGroupProtected), "policy_blocked");
    assert_eq!(error_kind(&Error::AuthenticationFailed), "policy_blocked");
    assert_eq!(
        error_kind(&Error::RateLimited { retry_after_secs: 5 }),
        "policy_blocked"
    );
    assert_eq!(
        error_kind(&Error::LockFailed(std::path::PathBuf::from("x.lock"))),
        "operation_failed"
    );
}

#[test]
fn format_human_keeps_section_order() {
    let mut human = HumanOutput::new("todovault config check: ok");
    human.push_next_step("todovault task list");
    human.push_warning("no config file found; using defaults");

    let rendered = format_human(&human);
    let warnings = rendered.find("Warnings:").expect("warnings section");
    let next = rendered.find("Next steps:").expect("next steps section");
    assert!(warnings < next);
}
