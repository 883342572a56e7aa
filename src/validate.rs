//! Validation of untrusted input.
//!
//! Everything a client sends arrives as JSON and passes through here before
//! it can reach the store. The functions are pure: each input maps to a
//! typed value or an `Error::Validation` naming the field.

use serde_json::{Map, Value};

use crate::clock::MS_PER_DAY;
use crate::error::{Error, Result};
use crate::model::Priority;

pub const MAX_TEXT_LENGTH: usize = 1000;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_GROUP_ID_LENGTH: usize = 100;

/// Timestamps further ahead than this are refused.
pub const MAX_FUTURE_MS: i64 = 365 * MS_PER_DAY;

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

/// Trim and drop control characters other than tab, newline and carriage
/// return.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize, then require a non-empty result of at most `max_len` chars.
pub fn bounded_text(field: &str, value: Option<&Value>, max_len: usize) -> Result<String> {
    let raw = match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => {
            return Err(Error::validation(field, "is required"));
        }
        Some(_) => return Err(Error::validation(field, "must be a string")),
    };

    let clean = sanitize(raw);
    if clean.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    if clean.chars().count() > max_len {
        return Err(Error::validation(
            field,
            format!("cannot exceed {max_len} characters"),
        ));
    }
    Ok(clean)
}

pub fn task_text(value: Option<&Value>) -> Result<String> {
    bounded_text("text", value, MAX_TEXT_LENGTH)
}

pub fn group_name(value: Option<&Value>) -> Result<String> {
    bounded_text("name", value, MAX_NAME_LENGTH)
}

/// Exact 8-4-4-4-12 hex shape, either case.
pub fn is_uuid_shaped(s: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// A task or group reference used by updates, deletes and likes.
pub fn uuid(field: &str, value: Option<&Value>) -> Result<String> {
    match value {
        Some(Value::String(s)) if is_uuid_shaped(s) => Ok(s.clone()),
        Some(Value::String(_)) => Err(Error::validation(field, "invalid ID format")),
        Some(Value::Null) | None => Err(Error::validation(field, "is required")),
        Some(_) => Err(Error::validation(field, "must be a string")),
    }
}

/// [`uuid`] for a bare string, e.g. a path or query parameter.
pub fn uuid_str(field: &str, value: &str) -> Result<String> {
    uuid(field, Some(&Value::String(value.to_string())))
}

/// Group assignment: 1 to 100 of `[A-Za-z0-9_-]`. Accepts both the
/// `default` id and generated UUIDs.
pub fn group_id(value: &Value) -> Result<String> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::validation("groupId", "must be a string"))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_GROUP_ID_LENGTH {
        return Err(Error::validation("groupId", "invalid group ID format"));
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(Error::validation(
            "groupId",
            "contains invalid characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Absent, null or empty string yields the default (`P1`).
pub fn priority(value: Option<&Value>) -> Result<Priority> {
    match value {
        None | Some(Value::Null) => Ok(Priority::default()),
        Some(Value::String(s)) if s.is_empty() => Ok(Priority::default()),
        Some(Value::String(s)) => s.parse(),
        Some(_) => Err(Error::validation(
            "priority",
            "must be one of P0, P1, P2",
        )),
    }
}

/// Epoch milliseconds from a number or numeric string. Absent or null yields
/// `now_ms`. Negative values and values more than a year past `now_ms` are
/// refused.
pub fn timestamp(field: &str, value: Option<&Value>, now_ms: i64) -> Result<i64> {
    let ts = match value {
        None | Some(Value::Null) => return Ok(now_ms),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| Error::validation(field, "invalid timestamp"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::validation(field, "invalid timestamp"))?,
        Some(_) => return Err(Error::validation(field, "invalid timestamp")),
    };

    if ts < 0 {
        return Err(Error::validation(field, "cannot be negative"));
    }
    if ts > now_ms.saturating_add(MAX_FUTURE_MS) {
        return Err(Error::validation(
            field,
            "cannot be more than 1 year in the future",
        ));
    }
    Ok(ts)
}

/// Native bool or case-insensitive `"true"`/`"false"`; anything else is
/// `default`.
pub fn boolean(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

fn object<'a>(payload: &'a Value) -> Result<&'a Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| Error::validation("body", "must be a JSON object"))
}

/// True when the key is present with a non-null value.
fn provided<'a>(body: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|v| !v.is_null())
}

// =============================================================================
// Payloads
// =============================================================================

/// Fields for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub group_id: Option<String>,
    pub priority: Priority,
    pub created_at: i64,
}

impl NewTask {
    pub fn from_json(payload: &Value, now_ms: i64) -> Result<Self> {
        let body = object(payload)?;
        Ok(Self {
            text: task_text(body.get("text"))?,
            group_id: provided(body, "groupId").map(group_id).transpose()?,
            priority: priority(body.get("priority"))?,
            created_at: timestamp("createdAt", body.get("createdAt"), now_ms)?,
        })
    }
}

/// Partial update of a task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub created_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub group_id: Option<String>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn from_json(payload: &Value, now_ms: i64) -> Result<Self> {
        let body = object(payload)?;
        let completed = match provided(body, "completed") {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Some(true),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Some(false),
            Some(_) => return Err(Error::validation("completed", "must be a boolean")),
            None => None,
        };

        Ok(Self {
            text: provided(body, "text")
                .map(|v| task_text(Some(v)))
                .transpose()?,
            completed,
            created_at: provided(body, "createdAt")
                .map(|v| timestamp("createdAt", Some(v), now_ms))
                .transpose()?,
            completed_at: provided(body, "completedAt")
                .map(|v| timestamp("completedAt", Some(v), now_ms))
                .transpose()?,
            group_id: provided(body, "groupId").map(group_id).transpose()?,
            priority: provided(body, "priority")
                .map(|v| priority(Some(v)))
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }
}

/// Fields for a new group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
}

impl NewGroup {
    pub fn from_json(payload: &Value) -> Result<Self> {
        let body = object(payload)?;
        Ok(Self {
            name: group_name(body.get("name"))?,
        })
    }
}

/// Body of a like toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRequest {
    pub task_id: String,
}

impl LikeRequest {
    pub fn from_json(payload: &Value) -> Result<Self> {
        let body = object(payload)?;
        Ok(Self {
            task_id: uuid("todoId", body.get("todoId"))?,
        })
    }
}

/// Body of a visit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRequest {
    pub is_new_visitor: bool,
}

impl VisitRequest {
    pub fn from_json(payload: &Value) -> Result<Self> {
        let body = object(payload)?;
        Ok(Self {
            is_new_visitor: boolean(body.get("isNewVisitor"), false),
        })
    }
}
