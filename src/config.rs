//! Configuration loading and management
//!
//! Handles parsing of `todovault.toml` configuration files plus the
//! `TODOVAULT_*` environment overrides.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data_dir;
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "todovault.toml";

/// Environment variable overriding `storage.data_dir`
pub const ENV_DATA_DIR: &str = "TODOVAULT_DATA_DIR";

/// Environment variable overriding `auth.password`
pub const ENV_AUTH_PASSWORD: &str = "TODOVAULT_AUTH_PASSWORD";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Record store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// General request policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Password verification policy. Fields left out of the section keep
    /// the auth defaults, not the general ones.
    #[serde(
        default = "RateLimitConfig::auth_default",
        deserialize_with = "deserialize_auth_rate_limit"
    )]
    pub auth_rate_limit: RateLimitConfig,

    /// Background sweep of expired rate-limit entries
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Shared-password authentication
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth_rate_limit: RateLimitConfig::auth_default(),
            sweeper: SweeperConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Prefixes the data directory must fall under (Unix only).
    /// Empty means the built-in defaults.
    #[serde(default)]
    pub allowed_prefixes: Vec<PathBuf>,

    /// How long to wait for a collection lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            allowed_prefixes: Vec::new(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn allowed_prefixes(&self) -> Vec<PathBuf> {
        if self.allowed_prefixes.is_empty() {
            data_dir::default_allowed_prefixes()
        } else {
            self.allowed_prefixes.clone()
        }
    }

    /// Resolve the data directory against the allow-list.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        data_dir::resolve_data_dir(&self.data_dir, &self.allowed_prefixes())
    }
}

/// Fixed-window rate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    /// 5 attempts per 15 minutes.
    pub fn auth_default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 15 * 60,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_requests == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "{section}.max_requests must be > 0"
            )));
        }
        if self.window_secs == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "{section}.window_secs must be > 0"
            )));
        }
        Ok(())
    }
}

/// A rate section as written, before defaults are filled in.
#[derive(Deserialize)]
struct RateLimitSection {
    max_requests: Option<u32>,
    window_secs: Option<u64>,
}

impl RateLimitSection {
    fn over(self, base: RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.max_requests.unwrap_or(base.max_requests),
            window_secs: self.window_secs.unwrap_or(base.window_secs),
        }
    }
}

fn deserialize_auth_rate_limit<'de, D>(
    deserializer: D,
) -> std::result::Result<RateLimitConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let section = RateLimitSection::deserialize(deserializer)?;
    Ok(section.over(RateLimitConfig::auth_default()))
}

/// Sweeper configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Authentication configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared password; unset disables password checks (every attempt fails)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults. A file that exists but
    /// fails to parse or validate is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `TODOVAULT_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_DATA_DIR).ok(),
            std::env::var(ENV_AUTH_PASSWORD).ok(),
        )
    }

    pub fn with_overrides(mut self, data_dir: Option<String>, password: Option<String>) -> Self {
        if let Some(dir) = data_dir.filter(|d| !d.trim().is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.auth.password = Some(password);
        }
        self
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate("rate_limit")?;
        self.auth_rate_limit.validate("auth_rate_limit")?;
        if self.sweeper.interval_secs == 0 {
            return Err(Error::InvalidConfiguration(
                "sweeper.interval_secs must be > 0".to_string(),
            ));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
