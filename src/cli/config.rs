//! todovault config check, init and repair commands

use std::path::PathBuf;

use crate::cli::Context;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::storage::{Collection, Storage};

/// Options for `todovault config init`
pub struct InitOptions {
    pub force: bool,
    pub ctx: Context,
}

/// Options for `todovault repair`
pub struct RepairOptions {
    pub collection: String,
    pub ctx: Context,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigReport {
    config_path: PathBuf,
    config_file_found: bool,
    data_dir: PathBuf,
    rate_limit: crate::config::RateLimitConfig,
    auth_rate_limit: crate::config::RateLimitConfig,
    sweep_interval_secs: u64,
    auth_configured: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct InitReport {
    config_path: PathBuf,
    written: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RepairReport {
    collection: String,
    repaired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<PathBuf>,
}

pub fn run_check(ctx: Context) -> Result<()> {
    let config_path = ctx.config_path();
    let config = ctx.load_config()?;
    config.validate()?;
    let data_dir = config.storage.resolve_data_dir()?;

    let report = ConfigReport {
        config_file_found: config_path.exists(),
        config_path,
        data_dir,
        rate_limit: config.rate_limit,
        auth_rate_limit: config.auth_rate_limit,
        sweep_interval_secs: config.sweeper.interval_secs,
        auth_configured: config.auth.password.is_some(),
    };

    let mut human = HumanOutput::new("todovault config check: ok");
    human.push_summary("config", report.config_path.display().to_string());
    human.push_summary("data dir", report.data_dir.display().to_string());
    human.push_summary(
        "rate limit",
        format!(
            "{} per {}s",
            report.rate_limit.max_requests, report.rate_limit.window_secs
        ),
    );
    human.push_summary(
        "auth rate limit",
        format!(
            "{} per {}s",
            report.auth_rate_limit.max_requests, report.auth_rate_limit.window_secs
        ),
    );
    if !report.config_file_found {
        human.push_warning("no config file found; using defaults");
    }
    if !report.auth_configured {
        human.push_warning("auth.password not set; every password attempt is refused");
    }

    emit_success(ctx.output(), "config check", &report, Some(&human))
}

pub fn run_init(options: InitOptions) -> Result<()> {
    let config_path = options.ctx.config_path();
    if config_path.exists() && !config_path.is_file() {
        return Err(Error::InvalidConfiguration(format!(
            "config path exists but is not a file: {}",
            config_path.display()
        )));
    }

    let written = options.force || !config_path.exists();
    if written {
        Config::default().save(&config_path)?;
        tracing::info!(path = %config_path.display(), "wrote default config");
    }

    let mut human = if written {
        HumanOutput::new(format!("todovault config init: wrote {}", config_path.display()))
    } else {
        let mut human = HumanOutput::new(format!(
            "todovault config init: {} already exists",
            config_path.display()
        ));
        human.push_warning("left unchanged; pass --force to overwrite");
        human
    };
    human.push_next_step("todovault config check");

    let report = InitReport {
        config_path,
        written,
    };
    emit_success(options.ctx.output(), "config init", &report, Some(&human))
}

pub fn run_repair(options: RepairOptions) -> Result<()> {
    let collection: Collection = options.collection.parse()?;
    let config = options.ctx.load_config()?;
    let data_dir = config.storage.resolve_data_dir()?;
    let storage = Storage::at(data_dir).with_lock_timeout(config.storage.lock_timeout_ms);
    let backup = storage.reset_corrupt(collection)?;

    let report = RepairReport {
        collection: collection.file_name().to_string(),
        repaired: backup.is_some(),
        backup: backup.clone(),
    };
    let mut human = match &backup {
        Some(path) => {
            let mut human = HumanOutput::new(format!("todovault repair: reset {}", collection.file_name()));
            human.push_summary("backup", path.display().to_string());
            human
        }
        None => HumanOutput::new(format!(
            "todovault repair: {} is healthy",
            collection.file_name()
        )),
    };
    human.push_next_step("todovault task list");

    emit_success(options.ctx.output(), "repair", &report, Some(&human))
}
