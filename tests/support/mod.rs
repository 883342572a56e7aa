#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use tempfile::TempDir;
use todovault::auth::Authenticator;
use todovault::clock::{ManualClock, SequentialIds};
use todovault::config::RateLimitConfig;
use todovault::ratelimit::RateGovernor;
use todovault::service::TodoService;
use todovault::storage::Storage;

pub const START_MS: i64 = 1_700_000_000_000;
pub const PASSWORD: &str = "correct horse";

/// A scratch working directory with a data dir inside it.
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Service over the data dir with a manual clock and predictable ids.
    pub fn service(&self) -> (TodoService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START_MS));
        let storage = Storage::new(self.data_dir(), clock.clone());
        storage.init().expect("init storage");
        let governor = Arc::new(RateGovernor::new(
            RateLimitConfig::default(),
            RateLimitConfig::auth_default(),
            clock.clone(),
        ));
        let service = TodoService::new(
            storage,
            governor,
            Authenticator::new(Some(PASSWORD.to_string())),
            clock.clone(),
        )
        .with_ids(Arc::new(SequentialIds::default()));
        (service, clock)
    }

    /// `todovault` run inside the scratch dir against its data dir.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("todovault").expect("binary");
        cmd.current_dir(self.path())
            .env_remove("TODOVAULT_CONFIG")
            .env_remove("TODOVAULT_AUTH_PASSWORD")
            .env_remove("TODOVAULT_API_KEY")
            .env_remove("RUST_LOG")
            .env("TODOVAULT_DATA_DIR", self.data_dir());
        cmd
    }

    /// Run `todovault --json <args>` and return the `data` member.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run todovault");
        assert!(
            output.status.success(),
            "todovault {args:?} failed: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        let envelope: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("json envelope");
        envelope["data"].clone()
    }
}
