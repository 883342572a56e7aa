//! Task tracker operations.
//!
//! [`TodoService`] is built once at startup and shared by reference. It
//! composes the record store, the rate governor and the authenticator;
//! callers validate untrusted payloads with [`crate::validate`] first and
//! hand the typed result in here.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::{api_key_from_headers, AuthOutcome, Authenticator};
use crate::client::{client_identifier, HeaderLookup};
use crate::clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Group, Stats, Task, DEFAULT_GROUP_ID};
use crate::ratelimit::{RateGovernor, RateLimitDecision};
use crate::storage::Storage;
use crate::validate::{NewGroup, NewTask, TaskPatch};

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: u64,
}

pub struct TodoService {
    storage: Storage,
    governor: Arc<RateGovernor>,
    auth: Authenticator,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for TodoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoService")
            .field("storage", &self.storage)
            .field("governor", &self.governor)
            .field("auth", &self.auth)
            .finish()
    }
}

impl TodoService {
    pub fn new(
        storage: Storage,
        governor: Arc<RateGovernor>,
        auth: Authenticator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            governor,
            auth,
            clock,
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Open the store described by `config` and build the governor and
    /// authenticator beside it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = Storage::open(&config.storage, clock.clone())?;
        let governor = Arc::new(RateGovernor::from_config(config, clock.clone()));
        Ok(Self::new(
            storage,
            governor,
            Authenticator::from_config(&config.auth),
            clock,
        ))
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn require_group(&self, group_id: &str) -> Result<()> {
        let groups = self.storage.load_groups()?;
        if groups.iter().any(|g| g.id == group_id) {
            Ok(())
        } else {
            Err(Error::not_found("group", group_id))
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Tasks that are not soft-deleted, in stored order.
    pub fn list_active_tasks(&self) -> Result<Vec<Task>> {
        let tasks = self.storage.load_tasks()?;
        Ok(tasks.into_iter().filter(Task::is_active).collect())
    }

    /// Ids of the tasks `client_ip` currently likes.
    pub fn liked_task_ids(&self, client_ip: &str) -> Result<Vec<String>> {
        Ok(self.storage.load_likes()?.liked_by(client_ip))
    }

    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let group_id = new
            .group_id
            .unwrap_or_else(|| DEFAULT_GROUP_ID.to_string());
        let mut task = Task::new(self.ids.next_id(), new.text, new.created_at);
        task.group_id = Some(group_id);
        task.priority = Some(new.priority);

        let task = self.storage.update_tasks(|tasks| {
            // tasks -> groups is the documented lock order
            self.require_group(task.group())?;
            tasks.push(task.clone());
            Ok(task)
        })?;
        tracing::info!(task_id = %task.id, group_id = task.group(), "created task");
        Ok(task)
    }

    /// Apply `patch` to an active task.
    ///
    /// Completing stamps `completedAt` with the supplied value or now;
    /// reopening clears it. A lone `completedAt` only applies to a task that
    /// is already complete. The result must keep `completedAt >= createdAt`.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let now = self.clock.now_ms();
        let task = self.storage.update_tasks(|tasks| {
            if let Some(group_id) = &patch.group_id {
                self.require_group(group_id)?;
            }
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id && t.is_active())
                .ok_or_else(|| Error::not_found("task", id))?;

            let mut updated = task.clone();
            if let Some(text) = patch.text {
                updated.text = text;
            }
            if let Some(priority) = patch.priority {
                updated.priority = Some(priority);
            }
            if let Some(group_id) = patch.group_id {
                updated.group_id = Some(group_id);
            }
            if let Some(created_at) = patch.created_at {
                updated.created_at = created_at;
            }
            match patch.completed {
                Some(true) => updated.complete(patch.completed_at.unwrap_or(now))?,
                Some(false) => updated.reopen(),
                None => {
                    if let (Some(at), true) = (patch.completed_at, updated.completed) {
                        updated.complete(at)?;
                    }
                }
            }
            if !updated.completion_is_consistent() {
                return Err(Error::validation(
                    "createdAt",
                    "must not be later than completedAt",
                ));
            }

            *task = updated.clone();
            Ok(updated)
        })?;
        tracing::info!(task_id = %task.id, completed = task.completed, "updated task");
        Ok(task)
    }

    /// Flag a task deleted. Its like record is dropped and its counter
    /// zeroed; the task itself stays in the document.
    pub fn soft_delete_task(&self, id: &str) -> Result<()> {
        let now = self.clock.now_ms();
        self.storage.update_tasks(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id && t.is_active())
                .ok_or_else(|| Error::not_found("task", id))?;
            task.soft_delete(now);
            task.likes = 0;
            Ok(())
        })?;
        tracing::info!(task_id = id, "soft-deleted task");

        // The delete is committed. A leftover record belongs to an inactive
        // task and the next purge clears it.
        if let Err(err) = self.storage.remove_likes_for_task(id) {
            tracing::error!(task_id = id, error = %err, "failed to drop like record of deleted task");
        }
        Ok(())
    }

    /// Permanently remove tasks soft-deleted more than `older_than` ago,
    /// with their like records. Returns how many were removed.
    pub fn purge_deleted(&self, older_than: Duration) -> Result<usize> {
        let age_ms = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let cutoff = self.clock.now_ms().saturating_sub(age_ms);

        let purged: BTreeSet<String> = self.storage.update_tasks(|tasks| {
            let mut purged = BTreeSet::new();
            tasks.retain(|t| {
                let expired = t.is_deleted() && t.deleted_at.map_or(true, |at| at < cutoff);
                if expired {
                    purged.insert(t.id.clone());
                }
                !expired
            });
            Ok(purged)
        })?;
        if purged.is_empty() {
            return Ok(0);
        }

        for id in &purged {
            self.storage.remove_likes_for_task(id)?;
        }
        tracing::info!(count = purged.len(), cutoff, "purged deleted tasks");
        Ok(purged.len())
    }

    // =========================================================================
    // Groups
    // =========================================================================

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.storage.load_groups()
    }

    pub fn create_group(&self, new: NewGroup) -> Result<Group> {
        let group = Group {
            id: self.ids.next_id(),
            name: new.name,
            created_at: self.clock.now_ms(),
        };
        self.storage.update_groups(|groups| {
            groups.push(group.clone());
            Ok(())
        })?;
        tracing::info!(group_id = %group.id, name = %group.name, "created group");
        Ok(group)
    }

    /// Delete a group and move its tasks to the default group. Returns how
    /// many tasks were reassigned.
    ///
    /// The tasks lock is held across both writes, so no task can be filed
    /// under the group once it is gone. If the task write fails the group
    /// is put back.
    pub fn delete_group(&self, id: &str) -> Result<usize> {
        if id == DEFAULT_GROUP_ID {
            return Err(Error::DefaultGroupProtected);
        }

        let mut removed: Option<Group> = None;
        let result = self.storage.update_tasks(|tasks| {
            let mut moved = 0;
            for task in tasks.iter_mut().filter(|t| t.group() == id) {
                task.group_id = Some(DEFAULT_GROUP_ID.to_string());
                moved += 1;
            }
            // tasks -> groups is the documented lock order
            removed = Some(self.storage.update_groups(|groups| {
                let at = groups
                    .iter()
                    .position(|g| g.id == id)
                    .ok_or_else(|| Error::not_found("group", id))?;
                Ok(groups.remove(at))
            })?);
            Ok(moved)
        });

        match result {
            Ok(moved) => {
                tracing::info!(group_id = id, reassigned = moved, "deleted group");
                Ok(moved)
            }
            Err(err) => {
                if let Some(group) = removed {
                    tracing::warn!(group_id = id, error = %err, "task reassignment failed; restoring group");
                    let restored = self.storage.update_groups(|groups| {
                        groups.push(group);
                        Ok(())
                    });
                    if let Err(restore) = restored {
                        tracing::error!(group_id = id, error = %restore, "failed to restore group");
                    }
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Flip `client_ip`'s like on an active task and sync the task's
    /// counter. If the counter cannot be written the toggle is undone.
    pub fn toggle_like(&self, task_id: &str, client_ip: &str) -> Result<LikeToggle> {
        let tasks = self.storage.load_tasks()?;
        if !tasks.iter().any(|t| t.id == task_id && t.is_active()) {
            return Err(Error::not_found("task", task_id));
        }

        let (liked, like_count) = self.storage.update_likes(|likes| {
            let liked = likes.toggle(task_id, client_ip);
            Ok((liked, likes.count(task_id)))
        })?;

        if let Err(err) = self.sync_like_counter(task_id) {
            tracing::warn!(task_id, error = %err, "like counter update failed; undoing toggle");
            self.undo_toggle(task_id, client_ip, liked);
            return Err(err);
        }

        tracing::info!(task_id, liked, like_count, "toggled like");
        Ok(LikeToggle { liked, like_count })
    }

    /// Copy the like set size onto the task's counter.
    fn sync_like_counter(&self, task_id: &str) -> Result<u64> {
        self.storage.update_tasks(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id && t.is_active())
                .ok_or_else(|| Error::not_found("task", task_id))?;
            // Re-read under the tasks lock so a slower concurrent toggle
            // cannot write back an older count.
            task.likes = self.storage.load_likes()?.count(task_id);
            Ok(task.likes)
        })
    }

    /// Reverse only this client's entry; toggles by other clients since
    /// then are kept.
    fn undo_toggle(&self, task_id: &str, client_ip: &str, liked: bool) {
        let undone = self.storage.update_likes(|likes| {
            if likes.contains(task_id, client_ip) == liked {
                likes.toggle(task_id, client_ip);
            }
            Ok(())
        });
        if let Err(err) = undone {
            tracing::error!(task_id, error = %err, "failed to undo like toggle");
            return;
        }
        if let Err(err) = self.sync_like_counter(task_id) {
            tracing::error!(task_id, error = %err, "like counter left stale after undo");
        }
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn record_visit(&self, is_new_visitor: bool) -> Result<Stats> {
        self.storage.increment_stats(is_new_visitor)
    }

    pub fn record_hit(&self, visitor_id: &str) -> Result<Stats> {
        self.storage.record_hit(visitor_id)
    }

    pub fn get_stats(&self) -> Result<Stats> {
        self.storage.load_stats()
    }

    // =========================================================================
    // Admission
    // =========================================================================

    pub fn check_rate_limit(&self, client: &str) -> RateLimitDecision {
        self.governor.check(client)
    }

    pub fn check_auth_rate_limit(&self, client: &str) -> RateLimitDecision {
        self.governor.check_auth(client)
    }

    /// Authenticate a request from its headers. The client comes from the
    /// proxy headers and the credential from `x-api-key` or a bearer token;
    /// a request with neither still counts as a failed attempt.
    pub fn authenticate_headers<H: HeaderLookup + ?Sized>(
        &self,
        headers: &H,
    ) -> (String, AuthOutcome) {
        let client = client_identifier(headers);
        let credential = api_key_from_headers(headers).unwrap_or_default();
        let outcome = self.authenticate(&client, &credential);
        (client, outcome)
    }

    /// Verify a password attempt under the authentication rate policy.
    pub fn authenticate(&self, client: &str, password: &str) -> AuthOutcome {
        let decision = self.governor.check_auth(client);
        if !decision.allowed {
            return AuthOutcome::RateLimited(decision);
        }
        if self.auth.verify(password) {
            tracing::info!(client, "authentication succeeded");
            AuthOutcome::Granted
        } else {
            tracing::warn!(client, remaining = decision.remaining, "authentication failed");
            AuthOutcome::Denied
        }
    }
}
