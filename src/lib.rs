//! todovault - durable task tracker core
//!
//! This library holds the persistence and admission core of a small task
//! tracker: a JSON-document record store, a per-client rate governor and the
//! validation layer that untrusted input passes through first.
//!
//! # Core Concepts
//!
//! - **Record store**: one JSON document per collection, rewritten whole
//!   under a per-collection file lock
//! - **Soft delete**: deleted tasks keep their record with `deleted: true`
//! - **Default group**: always present, never deletable, inherits the tasks
//!   of deleted groups
//! - **Rate governor**: fixed-window admission per client, one general
//!   policy and one for password attempts
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `todovault.toml`
//! - `error`: Error types and result aliases
//! - `model`: Persisted record types
//! - `storage`: JSON documents and directory management
//! - `lock`: File locking and atomic writes
//! - `data_dir`: Data directory validation
//! - `validate`: Sanitizing and validating untrusted payloads
//! - `ratelimit`: Fixed-window rate limiting and the expiry sweeper
//! - `client`: Client identification from request headers
//! - `auth`: Shared-password authentication
//! - `service`: The operations exposed to request handlers

pub mod auth;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod data_dir;
pub mod error;
pub mod lock;
pub mod model;
pub mod output;
pub mod ratelimit;
pub mod service;
pub mod storage;
pub mod validate;

pub use error::{Error, Result};
