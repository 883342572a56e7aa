//! todovault stats commands

use serde_json::{json, Value};

use crate::cli::Context;
use crate::error::Result;
use crate::model::Stats;
use crate::output::{emit_success, HumanOutput};
use crate::validate::{self, VisitRequest, MAX_NAME_LENGTH};

/// Options for `todovault stats visit`
pub struct VisitOptions {
    pub new: bool,
    pub ctx: Context,
}

/// Options for `todovault stats hit`
pub struct HitOptions {
    pub visitor: String,
    pub ctx: Context,
}

#[derive(serde::Serialize)]
struct StatsReport {
    pv: u64,
    uv: u64,
}

impl From<&Stats> for StatsReport {
    fn from(stats: &Stats) -> Self {
        Self {
            pv: stats.pv,
            uv: stats.uv,
        }
    }
}

fn emit_stats(ctx: &Context, command: &str, stats: &Stats) -> Result<()> {
    let mut human = HumanOutput::new(format!("todovault {command}"));
    human.push_summary("page views", stats.pv.to_string());
    human.push_summary("unique visitors", stats.uv.to_string());

    emit_success(ctx.output(), command, &StatsReport::from(stats), Some(&human))
}

pub fn run_show(ctx: Context) -> Result<()> {
    let service = ctx.open_service()?;
    let stats = service.get_stats()?;
    emit_stats(&ctx, "stats show", &stats)
}

pub fn run_visit(options: VisitOptions) -> Result<()> {
    let request = VisitRequest::from_json(&json!({ "isNewVisitor": options.new }))?;
    let service = options.ctx.open_service()?;
    let stats = service.record_visit(request.is_new_visitor)?;
    emit_stats(&options.ctx, "stats visit", &stats)
}

pub fn run_hit(options: HitOptions) -> Result<()> {
    let visitor = validate::bounded_text(
        "visitor",
        Some(&Value::String(options.visitor)),
        MAX_NAME_LENGTH,
    )?;
    let service = options.ctx.open_service()?;
    let stats = service.record_hit(&visitor)?;
    emit_stats(&options.ctx, "stats hit", &stats)
}
