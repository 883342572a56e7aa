//! todovault task and like commands
//!
//! Arguments are folded into the same JSON payloads a web client would send
//! and go through [`crate::validate`] before reaching the service.

use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::cli::Context;
use crate::client;
use crate::error::{Error, Result};
use crate::model::Task;
use crate::output::{emit_success, HumanOutput};
use crate::validate::{self, LikeRequest, NewTask, TaskPatch};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Options for `todovault task list`
pub struct ListOptions {
    pub all: bool,
    pub ctx: Context,
}

/// Options for `todovault task add`
pub struct AddOptions {
    pub text: String,
    pub group: Option<String>,
    pub priority: Option<String>,
    pub ctx: Context,
}

/// Options for `todovault task update`
pub struct UpdateOptions {
    pub id: String,
    pub text: Option<String>,
    pub priority: Option<String>,
    pub group: Option<String>,
    pub completed: Option<bool>,
    pub ctx: Context,
}

/// Options for `todovault task done` and `todovault task undo`
pub struct SetCompletedOptions {
    pub id: String,
    pub completed: bool,
    pub ctx: Context,
}

/// Options for `todovault task rm`
pub struct RmOptions {
    pub id: String,
    pub ctx: Context,
}

/// Options for `todovault task purge`
pub struct PurgeOptions {
    pub older_than_days: u64,
    pub ctx: Context,
}

/// Options for `todovault like`
pub struct LikeOptions {
    pub task_id: String,
    pub ip: String,
    pub ctx: Context,
}

#[derive(serde::Serialize)]
struct RemovedReport {
    id: String,
    deleted: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeReport {
    purged: usize,
    older_than_days: u64,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeReport {
    todo_id: String,
    ip: String,
    liked: bool,
    like_count: u64,
}

fn describe(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let priority = task.priority.unwrap_or_default();
    let mut line = format!("[{mark}] {priority} {} ({})", task.text, task.id);
    if task.group() != crate::model::DEFAULT_GROUP_ID {
        line.push_str(&format!(" group={}", task.group()));
    }
    if task.likes > 0 {
        line.push_str(&format!(" likes={}", task.likes));
    }
    if task.is_deleted() {
        line.push_str(" deleted");
    }
    line
}

fn summarize(human: &mut HumanOutput, task: &Task) {
    human.push_summary("id", task.id.clone());
    human.push_summary("text", task.text.clone());
    human.push_summary("group", task.group().to_string());
    human.push_summary("priority", task.priority.unwrap_or_default().to_string());
    human.push_summary("completed", task.completed.to_string());
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let service = options.ctx.open_service()?;
    let tasks = if options.all {
        service.storage().load_tasks()?
    } else {
        service.list_active_tasks()?
    };

    let mut human = HumanOutput::new(format!("todovault task list: {} task(s)", tasks.len()));
    for task in &tasks {
        human.push_detail(describe(task));
    }
    if tasks.is_empty() {
        human.push_next_step("todovault task add \"<text>\"");
    }

    emit_success(options.ctx.output(), "task list", &tasks, Some(&human))
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let service = options.ctx.open_service()?;
    let payload = json!({
        "text": options.text,
        "groupId": options.group,
        "priority": options.priority,
    });
    let new = NewTask::from_json(&payload, service.now_ms())?;
    let task = service.create_task(new)?;

    let mut human = HumanOutput::new(format!("todovault task add: {}", task.id));
    summarize(&mut human, &task);
    human.push_next_step(format!("todovault task done {}", task.id));

    emit_success(options.ctx.output(), "task add", &task, Some(&human))
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let id = validate::uuid_str("id", &options.id)?;
    let service = options.ctx.open_service()?;

    let mut body = Map::new();
    if let Some(text) = options.text {
        body.insert("text".to_string(), Value::String(text));
    }
    if let Some(priority) = options.priority {
        body.insert("priority".to_string(), Value::String(priority));
    }
    if let Some(group) = options.group {
        body.insert("groupId".to_string(), Value::String(group));
    }
    if let Some(completed) = options.completed {
        body.insert("completed".to_string(), Value::Bool(completed));
    }

    let patch = TaskPatch::from_json(&Value::Object(body), service.now_ms())?;
    if patch.is_empty() {
        return Err(Error::validation(
            "update",
            "pass at least one of --text, --priority, --group, --completed",
        ));
    }
    let task = service.update_task(&id, patch)?;

    let mut human = HumanOutput::new(format!("todovault task update: {}", task.id));
    summarize(&mut human, &task);

    emit_success(options.ctx.output(), "task update", &task, Some(&human))
}

pub fn run_set_completed(options: SetCompletedOptions) -> Result<()> {
    let id = validate::uuid_str("id", &options.id)?;
    let service = options.ctx.open_service()?;
    let task = service.update_task(
        &id,
        TaskPatch {
            completed: Some(options.completed),
            ..TaskPatch::default()
        },
    )?;

    let (command, verb) = if options.completed {
        ("task done", "completed")
    } else {
        ("task undo", "reopened")
    };
    let mut human = HumanOutput::new(format!("todovault {command}: {verb} {}", task.id));
    summarize(&mut human, &task);

    emit_success(options.ctx.output(), command, &task, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let id = validate::uuid_str("id", &options.id)?;
    let service = options.ctx.open_service()?;
    service.soft_delete_task(&id)?;

    let report = RemovedReport {
        id: id.clone(),
        deleted: true,
    };
    let mut human = HumanOutput::new(format!("todovault task rm: {id}"));
    human.push_detail("task kept in the store with deleted=true");
    human.push_next_step("todovault task purge --older-than-days <n>");

    emit_success(options.ctx.output(), "task rm", &report, Some(&human))
}

pub fn run_purge(options: PurgeOptions) -> Result<()> {
    let service = options.ctx.open_service()?;
    let older_than = Duration::from_secs(options.older_than_days.saturating_mul(SECS_PER_DAY));
    let purged = service.purge_deleted(older_than)?;

    let report = PurgeReport {
        purged,
        older_than_days: options.older_than_days,
    };
    let mut human = HumanOutput::new(format!("todovault task purge: {purged} task(s) removed"));
    human.push_summary("older than", format!("{} day(s)", options.older_than_days));

    emit_success(options.ctx.output(), "task purge", &report, Some(&human))
}

pub fn run_like(options: LikeOptions) -> Result<()> {
    let request = LikeRequest::from_json(&json!({ "todoId": options.task_id }))?;
    let ip = client::client_identifier(&[("x-real-ip", options.ip.as_str())]);
    if ip == client::UNKNOWN_CLIENT {
        return Err(Error::validation("ip", "not a valid client address"));
    }

    let service = options.ctx.open_service()?;
    let toggle = service.toggle_like(&request.task_id, &ip)?;

    let report = LikeReport {
        todo_id: request.task_id.clone(),
        ip,
        liked: toggle.liked,
        like_count: toggle.like_count,
    };
    let verb = if toggle.liked { "liked" } else { "unliked" };
    let mut human = HumanOutput::new(format!("todovault like: {verb} {}", request.task_id));
    human.push_summary("likes", toggle.like_count.to_string());

    emit_success(options.ctx.output(), "like", &report, Some(&human))
}
