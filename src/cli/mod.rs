//! Command-line interface for todovault
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command family is implemented in its own submodule.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::service::TodoService;

mod auth;
mod config;
mod group;
mod stats;
mod task;

/// todovault - durable task tracker store
///
/// Operator tool for the JSON record store behind the task tracker: tasks,
/// groups, likes and visit statistics.
#[derive(Parser, Debug)]
#[command(name = "todovault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the JSON documents
    #[arg(long, global = true, env = "TODOVAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to the configuration file (defaults to ./todovault.toml)
    #[arg(long, global = true, env = "TODOVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Group management
    #[command(subcommand)]
    Group(GroupCommands),

    /// Toggle a client's like on a task
    Like {
        /// Task ID
        task_id: String,

        /// Client address recorded for the like
        #[arg(long)]
        ip: String,
    },

    /// Visit statistics
    #[command(subcommand)]
    Stats(StatsCommands),

    /// Check a credential under the authentication rate policy
    Auth {
        /// Credential, sent as the x-api-key header
        #[arg(long, env = "TODOVAULT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Client address the attempt is counted against
        #[arg(long)]
        ip: Option<String>,
    },

    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Back up a corrupt document and replace it with an empty collection
    Repair {
        /// Collection: tasks, groups, likes, stats
        collection: String,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List {
        /// Include soft-deleted tasks
        #[arg(long)]
        all: bool,
    },

    /// Create a task
    Add {
        /// Task text
        text: String,

        /// Group ID (defaults to the default group)
        #[arg(long)]
        group: Option<String>,

        /// Priority: P0, P1, P2
        #[arg(long)]
        priority: Option<String>,
    },

    /// Change fields of a task
    Update {
        /// Task ID
        id: String,

        /// New text
        #[arg(long)]
        text: Option<String>,

        /// New priority: P0, P1, P2
        #[arg(long)]
        priority: Option<String>,

        /// Move to group ID
        #[arg(long)]
        group: Option<String>,

        /// Completion state
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Mark a task complete
    Done {
        /// Task ID
        id: String,
    },

    /// Reopen a completed task
    Undo {
        /// Task ID
        id: String,
    },

    /// Soft-delete a task
    Rm {
        /// Task ID
        id: String,
    },

    /// Permanently remove soft-deleted tasks
    Purge {
        /// Only tasks deleted more than this many days ago
        #[arg(long, default_value = "30")]
        older_than_days: u64,
    },
}

/// Group subcommands
#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// List groups
    List,

    /// Create a group
    Add {
        /// Group name
        name: String,
    },

    /// Delete a group, moving its tasks to the default group
    Rm {
        /// Group ID
        id: String,
    },
}

/// Stats subcommands
#[derive(Subcommand, Debug)]
pub enum StatsCommands {
    /// Show page views and unique visitors
    Show,

    /// Record a page view
    Visit {
        /// Count a new unique visitor as well
        #[arg(long)]
        new: bool,
    },

    /// Record a page view for a visitor identifier
    Hit {
        /// Visitor identifier
        visitor: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration and the data directory
    Check,

    /// Write a config file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Path of the config file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration: an explicit `--config` must exist, the implicit
    /// `./todovault.toml` may be absent. Environment and `--data-dir`
    /// override the file.
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::InvalidConfiguration(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Config::load(path)?
            }
            None => Config::load_or_default(Path::new(CONFIG_FILE))?,
        };

        let mut config = config.with_env_overrides();
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        tracing::debug!(data_dir = %config.storage.data_dir.display(), "loaded configuration");
        Ok(config)
    }

    pub fn open_service(&self) -> Result<TodoService> {
        TodoService::from_config(&self.load_config()?)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context {
            data_dir: self.data_dir,
            config: self.config,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Task(cmd) => match cmd {
                TaskCommands::List { all } => task::run_list(task::ListOptions { all, ctx }),
                TaskCommands::Add {
                    text,
                    group,
                    priority,
                } => task::run_add(task::AddOptions {
                    text,
                    group,
                    priority,
                    ctx,
                }),
                TaskCommands::Update {
                    id,
                    text,
                    priority,
                    group,
                    completed,
                } => task::run_update(task::UpdateOptions {
                    id,
                    text,
                    priority,
                    group,
                    completed,
                    ctx,
                }),
                TaskCommands::Done { id } => task::run_set_completed(task::SetCompletedOptions {
                    id,
                    completed: true,
                    ctx,
                }),
                TaskCommands::Undo { id } => task::run_set_completed(task::SetCompletedOptions {
                    id,
                    completed: false,
                    ctx,
                }),
                TaskCommands::Rm { id } => task::run_rm(task::RmOptions { id, ctx }),
                TaskCommands::Purge { older_than_days } => task::run_purge(task::PurgeOptions {
                    older_than_days,
                    ctx,
                }),
            },
            Commands::Group(cmd) => match cmd {
                GroupCommands::List => group::run_list(ctx),
                GroupCommands::Add { name } => group::run_add(group::AddOptions { name, ctx }),
                GroupCommands::Rm { id } => group::run_rm(group::RmOptions { id, ctx }),
            },
            Commands::Like { task_id, ip } => task::run_like(task::LikeOptions { task_id, ip, ctx }),
            Commands::Stats(cmd) => match cmd {
                StatsCommands::Show => stats::run_show(ctx),
                StatsCommands::Visit { new } => stats::run_visit(stats::VisitOptions { new, ctx }),
                StatsCommands::Hit { visitor } => {
                    stats::run_hit(stats::HitOptions { visitor, ctx })
                }
            },
            Commands::Auth { api_key, ip } => auth::run_auth(auth::AuthOptions { api_key, ip, ctx }),
            Commands::Config(ConfigCommands::Check) => config::run_check(ctx),
            Commands::Config(ConfigCommands::Init { force }) => {
                config::run_init(config::InitOptions { force, ctx })
            }
            Commands::Repair { collection } => {
                config::run_repair(config::RepairOptions { collection, ctx })
            }
        }
    }
}
