//! todovault group commands

use serde_json::json;

use crate::cli::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::validate::{self, NewGroup};

/// Options for `todovault group add`
pub struct AddOptions {
    pub name: String,
    pub ctx: Context,
}

/// Options for `todovault group rm`
pub struct RmOptions {
    pub id: String,
    pub ctx: Context,
}

#[derive(serde::Serialize)]
struct GroupRemovedReport {
    id: String,
    reassigned: usize,
}

pub fn run_list(ctx: Context) -> Result<()> {
    let service = ctx.open_service()?;
    let groups = service.list_groups()?;

    let mut human = HumanOutput::new(format!("todovault group list: {} group(s)", groups.len()));
    for group in &groups {
        human.push_detail(format!("{} ({})", group.name, group.id));
    }

    emit_success(ctx.output(), "group list", &groups, Some(&human))
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let new = NewGroup::from_json(&json!({ "name": options.name }))?;
    let service = options.ctx.open_service()?;
    let group = service.create_group(new)?;

    let mut human = HumanOutput::new(format!("todovault group add: {}", group.name));
    human.push_summary("id", group.id.clone());
    human.push_next_step(format!("todovault task add \"<text>\" --group {}", group.id));

    emit_success(options.ctx.output(), "group add", &group, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let id = validate::group_id(&json!(options.id))?;
    let service = options.ctx.open_service()?;
    let reassigned = service.delete_group(&id)?;

    let report = GroupRemovedReport {
        id: id.clone(),
        reassigned,
    };
    let mut human = HumanOutput::new(format!("todovault group rm: {id}"));
    human.push_summary("tasks moved to default", reassigned.to_string());

    emit_success(options.ctx.output(), "group rm", &report, Some(&human))
}
