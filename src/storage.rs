//! Record store for todovault
//!
//! Every collection lives in one pretty-printed JSON document inside the
//! data directory and is rewritten whole on each change.
//!
//! # Directory Structure
//!
//! ```text
//! <data_dir>/
//!   todos.json                     # Array of tasks (soft-deleted ones included)
//!   groups.json                    # Array of groups, always holding `default`
//!   likes.json                     # Task id -> array of client IPs
//!   stats.json                     # { pv, uv, visitors? }
//!   <name>.json.lock               # Advisory lock per collection
//!   <name>.corrupt-<ts>.json       # Backup of a document that failed to parse
//! ```
//!
//! Read-modify-write cycles hold the collection's lock from read to rename.
//! When one operation touches several collections it takes the locks in
//! [`Collection`] declaration order: tasks, groups, likes, stats.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{Group, Likes, Priority, Stats, Task, DEFAULT_GROUP_ID};

/// The persisted collections, in lock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Collection {
    Tasks,
    Groups,
    Likes,
    Stats,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Tasks,
        Collection::Groups,
        Collection::Likes,
        Collection::Stats,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Tasks => "todos.json",
            Collection::Groups => "groups.json",
            Collection::Likes => "likes.json",
            Collection::Stats => "stats.json",
        }
    }

    fn stem(&self) -> &'static str {
        match self {
            Collection::Tasks => "todos",
            Collection::Groups => "groups",
            Collection::Likes => "likes",
            Collection::Stats => "stats",
        }
    }
}

impl std::str::FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tasks" | "todos" => Ok(Collection::Tasks),
            "groups" => Ok(Collection::Groups),
            "likes" => Ok(Collection::Likes),
            "stats" => Ok(Collection::Stats),
            _ => Err(Error::validation(
                "collection",
                format!("'{s}' is not one of tasks, groups, likes, stats"),
            )),
        }
    }
}

/// Storage manager for the JSON documents
#[derive(Clone)]
pub struct Storage {
    data_dir: PathBuf,
    lock_timeout_ms: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("data_dir", &self.data_dir)
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .finish()
    }
}

impl Storage {
    /// Create a store rooted at an already validated directory.
    pub fn new(data_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            clock,
        }
    }

    /// Store using wall-clock time.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir, Arc::new(SystemClock))
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Validate the configured directory, create it, and seed any missing
    /// documents. Startup entry point.
    pub fn open(config: &StorageConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let data_dir = config.resolve_data_dir()?;
        let storage = Self::new(data_dir, clock).with_lock_timeout(config.lock_timeout_ms);
        storage.init()?;
        Ok(storage)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.path_of(Collection::Tasks)
    }

    pub fn groups_file(&self) -> PathBuf {
        self.path_of(Collection::Groups)
    }

    pub fn likes_file(&self) -> PathBuf {
        self.path_of(Collection::Likes)
    }

    pub fn stats_file(&self) -> PathBuf {
        self.path_of(Collection::Stats)
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create the data directory and seed every missing document.
    pub fn init(&self) -> Result<()> {
        self.ensure_dir()?;
        for collection in Collection::ALL {
            let path = self.path_of(collection);
            if !path.exists() {
                let _lock = self.lock(collection)?;
                self.seed(collection)?;
            }
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir)
                .map_err(|e| Error::unavailable(&self.data_dir, e))?;
            tracing::info!(data_dir = %self.data_dir.display(), "created data directory");
        }
        Ok(())
    }

    fn seed(&self, collection: Collection) -> Result<()> {
        match collection {
            Collection::Tasks => self.write_document(collection, &Vec::<Task>::new()),
            Collection::Groups => {
                self.write_document(collection, &vec![Group::default_group(self.clock.now_ms())])
            }
            Collection::Likes => self.write_document(collection, &Likes::default()),
            Collection::Stats => self.write_document(collection, &Stats::default()),
        }?;
        tracing::info!(path = %self.path_of(collection).display(), "created new document");
        Ok(())
    }

    // =========================================================================
    // Document I/O helpers
    // =========================================================================

    fn lock(&self, collection: Collection) -> Result<FileLock> {
        FileLock::acquire(
            lock::lock_path_for(&self.path_of(collection)),
            self.lock_timeout_ms,
        )
    }

    /// Read a document, seeding it first when missing. Caller holds the lock.
    fn read_document<T: DeserializeOwned>(&self, collection: Collection) -> Result<T> {
        self.ensure_dir()?;
        let path = self.path_of(collection);
        if !path.exists() {
            self.seed(collection)?;
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::unavailable(&path, e))?;
        match serde_json::from_str(&content) {
            Ok(data) => Ok(data),
            Err(source) => {
                tracing::error!(path = %path.display(), error = %source, "document failed to parse");
                if let Err(err) = self.backup_corrupt(collection, content.as_bytes()) {
                    tracing::error!(path = %path.display(), error = %err, "corrupt document backup failed");
                }
                Err(Error::StorageCorrupt { path, source })
            }
        }
    }

    /// Atomically replace a document. Caller holds the lock.
    fn write_document<T: Serialize>(&self, collection: Collection, data: &T) -> Result<()> {
        let path = self.path_of(collection);
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(&path, json.as_bytes()).inspect_err(|err| {
            tracing::error!(path = %path.display(), error = %err, "document write failed");
        })
    }

    /// Copy unparseable bytes aside, unless an identical backup exists.
    fn backup_corrupt(&self, collection: Collection, bytes: &[u8]) -> Result<PathBuf> {
        let prefix = format!("{}.corrupt-", collection.stem());
        if let Ok(entries) = fs::read_dir(&self.data_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if !name.to_string_lossy().starts_with(&prefix) {
                    continue;
                }
                if fs::read(entry.path()).is_ok_and(|existing| existing == bytes) {
                    return Ok(entry.path());
                }
            }
        }

        let stamp = Utc
            .timestamp_millis_opt(self.clock.now_ms())
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y%m%dT%H%M%S%3fZ");
        let backup = self.data_dir.join(format!("{prefix}{stamp}.json"));
        fs::write(&backup, bytes).map_err(|e| Error::unavailable(&backup, e))?;
        tracing::warn!(backup = %backup.display(), "backed up corrupt document");
        Ok(backup)
    }

    /// Replace a corrupt document with an empty collection. The unparseable
    /// content is backed up first. Returns the backup path, or `None` when
    /// the document parsed and was left untouched.
    pub fn reset_corrupt(&self, collection: Collection) -> Result<Option<PathBuf>> {
        let _lock = self.lock(collection)?;
        let path = self.path_of(collection);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::unavailable(&path, e)),
        };

        let parses = match collection {
            Collection::Tasks => serde_json::from_slice::<Vec<Task>>(&content).is_ok(),
            Collection::Groups => serde_json::from_slice::<Vec<Group>>(&content).is_ok(),
            Collection::Likes => serde_json::from_slice::<Likes>(&content).is_ok(),
            Collection::Stats => serde_json::from_slice::<Stats>(&content).is_ok(),
        };
        if parses {
            return Ok(None);
        }

        let backup = self.backup_corrupt(collection, &content)?;
        self.seed(collection)?;
        tracing::warn!(path = %path.display(), backup = %backup.display(), "reset corrupt document");
        Ok(Some(backup))
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Load every task, soft-deleted ones included.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        let _lock = self.lock(Collection::Tasks)?;
        self.read_tasks()
    }

    /// Overwrite the task document.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let _lock = self.lock(Collection::Tasks)?;
        self.write_tasks(tasks)
    }

    /// Locked read-modify-write; nothing is written when `f` fails.
    pub fn update_tasks<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<T>,
    {
        let _lock = self.lock(Collection::Tasks)?;
        let mut tasks = self.read_tasks()?;
        let result = f(&mut tasks)?;
        self.write_tasks(&tasks)?;
        Ok(result)
    }

    fn read_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.read_document(Collection::Tasks)?;
        let backfilled = backfill_tasks(&mut tasks);
        if backfilled > 0 {
            tracing::warn!(count = backfilled, "backfilled tasks missing group or priority");
            self.write_document(Collection::Tasks, &tasks)?;
        }
        tracing::debug!(count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    fn write_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.write_document(Collection::Tasks, &tasks)?;
        tracing::debug!(count = tasks.len(), "saved tasks");
        Ok(())
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Load all groups; the default group is always present.
    pub fn load_groups(&self) -> Result<Vec<Group>> {
        let _lock = self.lock(Collection::Groups)?;
        self.read_groups()
    }

    pub fn save_groups(&self, groups: &[Group]) -> Result<()> {
        let _lock = self.lock(Collection::Groups)?;
        self.write_document(Collection::Groups, &groups)
    }

    pub fn update_groups<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Group>) -> Result<T>,
    {
        let _lock = self.lock(Collection::Groups)?;
        let mut groups = self.read_groups()?;
        let result = f(&mut groups)?;
        ensure_default_group(&mut groups, self.clock.now_ms());
        self.write_document(Collection::Groups, &groups)?;
        Ok(result)
    }

    fn read_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.read_document(Collection::Groups)?;
        if ensure_default_group(&mut groups, self.clock.now_ms()) {
            tracing::warn!("default group missing from document; restored");
            self.write_document(Collection::Groups, &groups)?;
        }
        Ok(groups)
    }

    // =========================================================================
    // Likes
    // =========================================================================

    pub fn load_likes(&self) -> Result<Likes> {
        let _lock = self.lock(Collection::Likes)?;
        self.read_document(Collection::Likes)
    }

    pub fn save_likes(&self, likes: &Likes) -> Result<()> {
        let _lock = self.lock(Collection::Likes)?;
        self.write_document(Collection::Likes, likes)
    }

    pub fn update_likes<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Likes) -> Result<T>,
    {
        let _lock = self.lock(Collection::Likes)?;
        let mut likes: Likes = self.read_document(Collection::Likes)?;
        let result = f(&mut likes)?;
        self.write_document(Collection::Likes, &likes)?;
        Ok(result)
    }

    /// Drop the like record of a purged task. Returns whether one existed.
    pub fn remove_likes_for_task(&self, task_id: &str) -> Result<bool> {
        let _lock = self.lock(Collection::Likes)?;
        let mut likes: Likes = self.read_document(Collection::Likes)?;
        if !likes.remove_task(task_id) {
            return Ok(false);
        }
        self.write_document(Collection::Likes, &likes)?;
        tracing::debug!(task_id, "removed like record");
        Ok(true)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn load_stats(&self) -> Result<Stats> {
        let _lock = self.lock(Collection::Stats)?;
        self.read_document(Collection::Stats)
    }

    pub fn save_stats(&self, stats: &Stats) -> Result<()> {
        let _lock = self.lock(Collection::Stats)?;
        self.write_document(Collection::Stats, stats)
    }

    pub fn update_stats<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Stats) -> Result<T>,
    {
        let _lock = self.lock(Collection::Stats)?;
        let mut stats: Stats = self.read_document(Collection::Stats)?;
        let result = f(&mut stats)?;
        self.write_document(Collection::Stats, &stats)?;
        Ok(result)
    }

    /// Count one page view, plus one unique visitor when flagged.
    pub fn increment_stats(&self, is_new_visitor: bool) -> Result<Stats> {
        let stats = self.update_stats(|stats| {
            stats.increment(is_new_visitor);
            Ok(stats.clone())
        })?;
        tracing::debug!(pv = stats.pv, uv = stats.uv, "updated stats");
        Ok(stats)
    }

    /// Count one page view for `visitor_id`; `uv` moves only the first time
    /// the identifier is seen.
    pub fn record_hit(&self, visitor_id: &str) -> Result<Stats> {
        self.update_stats(|stats| {
            stats.record_hit(visitor_id);
            Ok(stats.clone())
        })
    }
}

/// Assign the default group and priority to tasks written before those
/// fields existed. Idempotent; returns how many tasks changed.
pub fn backfill_tasks(tasks: &mut [Task]) -> usize {
    let mut changed = 0;
    for task in tasks.iter_mut() {
        let mut touched = false;
        if task.group_id.as_deref().map_or(true, |g| g.trim().is_empty()) {
            task.group_id = Some(DEFAULT_GROUP_ID.to_string());
            touched = true;
        }
        if task.priority.is_none() {
            task.priority = Some(Priority::default());
            touched = true;
        }
        if touched {
            changed += 1;
        }
    }
    changed
}

/// Put the default group back at the front if it is missing.
fn ensure_default_group(groups: &mut Vec<Group>, now_ms: i64) -> bool {
    if groups.iter().any(Group::is_default) {
        return false;
    }
    groups.insert(0, Group::default_group(now_ms));
    true
}
