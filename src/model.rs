//! Persisted record types.
//!
//! Field names and units match the JSON documents on disk: camelCase keys,
//! epoch-millisecond timestamps.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of the group that always exists and can never be deleted.
pub const DEFAULT_GROUP_ID: &str = "default";

/// Display name given to the seeded default group.
pub const DEFAULT_GROUP_NAME: &str = "Default";

// =============================================================================
// Priority
// =============================================================================

/// Task urgency. `P0` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::P0, Priority::P1, Priority::P2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P1
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            _ => Err(Error::validation(
                "priority",
                format!("'{s}' is not one of P0, P1, P2"),
            )),
        }
    }
}

// =============================================================================
// Task
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// `None` only for documents written before groups existed; filled in
    /// by the load-time backfill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub likes: u64,
}

impl Task {
    pub fn new(id: String, text: String, created_at: i64) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at,
            completed_at: None,
            deleted: None,
            deleted_at: None,
            group_id: Some(DEFAULT_GROUP_ID.to_string()),
            priority: Some(Priority::default()),
            likes: 0,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted()
    }

    pub fn group(&self) -> &str {
        self.group_id.as_deref().unwrap_or(DEFAULT_GROUP_ID)
    }

    /// Mark complete at `at`, never earlier than creation.
    pub fn complete(&mut self, at: i64) -> Result<()> {
        if at < self.created_at {
            return Err(Error::validation(
                "completedAt",
                "must not be earlier than createdAt",
            ));
        }
        self.completed = true;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    pub fn soft_delete(&mut self, at: i64) {
        self.deleted = Some(true);
        self.deleted_at = Some(at);
    }

    /// Completion invariant: completed iff a completion timestamp is set and
    /// it is not earlier than creation.
    pub fn completion_is_consistent(&self) -> bool {
        match (self.completed, self.completed_at) {
            (true, Some(at)) => at >= self.created_at,
            (false, None) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Group
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

impl Group {
    pub fn default_group(created_at: i64) -> Self {
        Self {
            id: DEFAULT_GROUP_ID.to_string(),
            name: DEFAULT_GROUP_NAME.to_string(),
            created_at,
        }
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_GROUP_ID
    }
}

// =============================================================================
// Likes
// =============================================================================

/// Task id to the set of client IPs that liked it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Likes(pub BTreeMap<String, BTreeSet<String>>);

impl Likes {
    pub fn count(&self, task_id: &str) -> u64 {
        self.0.get(task_id).map_or(0, |ips| ips.len() as u64)
    }

    pub fn contains(&self, task_id: &str, ip: &str) -> bool {
        self.0.get(task_id).is_some_and(|ips| ips.contains(ip))
    }

    /// Flip `ip`'s like on `task_id`. Returns whether the task is now liked.
    pub fn toggle(&mut self, task_id: &str, ip: &str) -> bool {
        let ips = self.0.entry(task_id.to_string()).or_default();
        let liked = if ips.remove(ip) {
            false
        } else {
            ips.insert(ip.to_string());
            true
        };
        if ips.is_empty() {
            self.0.remove(task_id);
        }
        liked
    }

    pub fn remove_task(&mut self, task_id: &str) -> bool {
        self.0.remove(task_id).is_some()
    }

    /// Task ids liked by `ip`.
    pub fn liked_by(&self, ip: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, ips)| ips.contains(ip))
            .map(|(task_id, _)| task_id.clone())
            .collect()
    }
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub pv: u64,
    pub uv: u64,
    /// Visitor identifiers seen by [`Stats::record_hit`].
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub visitors: BTreeSet<String>,
}

impl Stats {
    pub fn increment(&mut self, is_new_visitor: bool) {
        self.pv += 1;
        if is_new_visitor {
            self.uv += 1;
        }
    }

    /// Count a page view; the unique counter moves only for an unseen id.
    pub fn record_hit(&mut self, visitor_id: &str) -> bool {
        self.pv += 1;
        let is_new = self.visitors.insert(visitor_id.to_string());
        if is_new {
            self.uv += 1;
        }
        is_new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_defaults_to_middle_and_orders_by_urgency() {
        assert_eq!(Priority::default(), Priority::P1);
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P1 < Priority::P2);
        assert!("P3".parse::<Priority>().is_err());
        assert_eq!("P0".parse::<Priority>().unwrap(), Priority::P0);
    }

    #[test]
    fn task_json_uses_camel_case_and_omits_empty_fields() {
        let task = Task::new("id-1".to_string(), "Ship it".to_string(), 10);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["createdAt"], 10);
        assert_eq!(json["groupId"], "default");
        assert_eq!(json["priority"], "P1");
        assert!(json.get("completedAt").is_none());
        assert!(json.get("deleted").is_none());
    }

    #[test]
    fn legacy_task_without_group_or_likes_parses() {
        let raw = r#"{"id":"a","text":"old","completed":false,"createdAt":5}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.group_id, None);
        assert_eq!(task.group(), DEFAULT_GROUP_ID);
        assert_eq!(task.likes, 0);
    }

    #[test]
    fn complete_rejects_time_before_creation() {
        let mut task = Task::new("id".to_string(), "t".to_string(), 100);
        assert!(task.complete(99).is_err());
        assert!(!task.completed);
        task.complete(100).unwrap();
        assert!(task.completion_is_consistent());
        task.reopen();
        assert!(task.completion_is_consistent());
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn likes_toggle_keeps_set_semantics() {
        let mut likes = Likes::default();
        assert!(likes.toggle("t1", "1.1.1.1"));
        assert!(likes.toggle("t1", "2.2.2.2"));
        assert_eq!(likes.count("t1"), 2);
        assert!(!likes.toggle("t1", "1.1.1.1"));
        assert_eq!(likes.count("t1"), 1);
        assert!(!likes.toggle("t1", "2.2.2.2"));
        assert!(likes.0.is_empty());
    }

    #[test]
    fn likes_deserialize_dedupes_ips() {
        let likes: Likes = serde_json::from_str(r#"{"t":["a","a","b"]}"#).unwrap();
        assert_eq!(likes.count("t"), 2);
        assert_eq!(likes.liked_by("a"), vec!["t".to_string()]);
    }

    #[test]
    fn stats_record_hit_counts_unique_visitors_once() {
        let mut stats = Stats::default();
        assert!(stats.record_hit("v1"));
        assert!(!stats.record_hit("v1"));
        assert!(stats.record_hit("v2"));
        assert_eq!(stats.pv, 3);
        assert_eq!(stats.uv, 2);
    }

    #[test]
    fn stats_document_without_visitors_parses() {
        let stats: Stats = serde_json::from_str(r#"{"pv":3,"uv":1}"#).unwrap();
        assert_eq!(stats.pv, 3);
        assert!(stats.visitors.is_empty());
    }
}
