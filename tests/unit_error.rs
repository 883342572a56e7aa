use std::path::PathBuf;

use todovault::error::{exit_codes, Error, JsonError, STORAGE_FAILURE_MESSAGE};

fn corrupt() -> Error {
    let source = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    Error::StorageCorrupt {
        path: PathBuf::from("/data/secret/todos.json"),
        source,
    }
}

#[test]
fn exit_codes_map_correctly() {
    let user = Error::validation("text", "cannot be empty");
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::not_found("task", "abc");
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let policy = Error::DefaultGroupProtected;
    assert_eq!(policy.exit_code(), exit_codes::POLICY_BLOCKED);
    assert_eq!(Error::AuthenticationFailed.exit_code(), exit_codes::POLICY_BLOCKED);

    let throttled = Error::RateLimited { retry_after_secs: 42 };
    assert_eq!(throttled.exit_code(), exit_codes::POLICY_BLOCKED);
    assert_eq!(throttled.details().expect("details")["retryAfter"], 42);

    let op = Error::LockFailed(PathBuf::from("/data/todos.json.lock"));
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
    assert_eq!(corrupt().exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::validation("priority", "'P9' is not one of P0, P1, P2");
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Invalid priority"));
    let details = json.details.expect("details");
    assert_eq!(details["field"], "priority");
}

#[test]
fn storage_faults_never_leak_paths() {
    let err = corrupt();
    assert!(err.is_storage_fault());
    assert!(err.to_string().contains("/data/secret"));

    let json = JsonError::from(&err);
    assert_eq!(json.error, STORAGE_FAILURE_MESSAGE);
    assert!(json.details.is_none());

    let rendered = serde_json::to_string(&json).expect("serialize");
    assert!(!rendered.contains("secret"));
}

#[test]
fn not_found_message_names_kind() {
    let err = Error::not_found("group", "g-1");
    assert_eq!(err.public_message(), "group not found: g-1");
    assert!(!err.is_storage_fault());
}
