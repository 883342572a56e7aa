//! Per-client request admission.
//!
//! Each policy keeps a `{count, reset_at}` entry per client key. The first
//! request after a window expires opens a fresh window; requests beyond
//! `max_requests` inside a window are rejected until it resets. Rejection is
//! an ordinary [`RateLimitDecision`], never an error.
//!
//! State lives only in memory and is lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, MS_PER_SEC};
use crate::config::{Config, RateLimitConfig};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Epoch milliseconds at which the client's window resets.
    pub reset_time: i64,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = self.reset_time.saturating_sub(now_ms).max(0);
        let secs = wait_ms / MS_PER_SEC + i64::from(wait_ms % MS_PER_SEC != 0);
        u64::try_from(secs).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at: i64,
}

/// One fixed-window policy.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitConfig) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RateLimitConfig {
        self.policy
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.policy.window().as_millis()).unwrap_or(i64::MAX)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are plain counters; a panic mid-update cannot leave them torn.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admit or reject one request from `key` at `now_ms`.
    pub fn check_at(&self, key: &str, now_ms: i64) -> RateLimitDecision {
        let max = self.policy.max_requests;
        let mut entries = self.entries();

        match entries.get_mut(key) {
            Some(entry) if now_ms <= entry.reset_at => {
                entry.count = entry.count.saturating_add(1);
                if entry.count > max {
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_time: entry.reset_at,
                    }
                } else {
                    RateLimitDecision {
                        allowed: true,
                        remaining: max - entry.count,
                        reset_time: entry.reset_at,
                    }
                }
            }
            _ => {
                let reset_at = now_ms.saturating_add(self.window_ms());
                entries.insert(key.to_string(), Entry { count: 1, reset_at });
                RateLimitDecision {
                    allowed: true,
                    remaining: max.saturating_sub(1),
                    reset_time: reset_at,
                }
            }
        }
    }

    /// Drop entries whose window has elapsed. Returns how many went.
    pub fn sweep_at(&self, now_ms: i64) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now_ms <= entry.reset_at);
        before - entries.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries().len()
    }
}

/// The two policies: general traffic and password attempts.
pub struct RateGovernor {
    general: RateLimiter,
    auth: RateLimiter,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("general", &self.general)
            .field("auth", &self.auth)
            .finish()
    }
}

impl RateGovernor {
    pub fn new(general: RateLimitConfig, auth: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            general: RateLimiter::new(general),
            auth: RateLimiter::new(auth),
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.rate_limit, config.auth_rate_limit, clock)
    }

    pub fn general(&self) -> &RateLimiter {
        &self.general
    }

    pub fn auth(&self) -> &RateLimiter {
        &self.auth
    }

    /// General policy, for mutating and list endpoints.
    pub fn check(&self, client: &str) -> RateLimitDecision {
        let decision = self.general.check_at(client, self.clock.now_ms());
        if !decision.allowed {
            tracing::info!(client, reset_time = decision.reset_time, "request rate limited");
        }
        decision
    }

    /// Authentication policy, for password verification only.
    pub fn check_auth(&self, client: &str) -> RateLimitDecision {
        let decision = self.auth.check_at(client, self.clock.now_ms());
        if !decision.allowed {
            tracing::warn!(client, reset_time = decision.reset_time, "auth attempts rate limited");
        }
        decision
    }

    /// Purge expired entries from both policies.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        self.general.sweep_at(now) + self.auth.sweep_at(now)
    }
}

/// Sweep `governor` every `period` on the tokio runtime. The task ends once
/// the governor is dropped.
pub fn spawn_sweeper(governor: &Arc<RateGovernor>, period: Duration) -> JoinHandle<()> {
    let governor: Weak<RateGovernor> = Arc::downgrade(governor);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(governor) = governor.upgrade() else {
                break;
            };
            let removed = governor.sweep();
            if removed > 0 {
                tracing::debug!(removed, "swept expired rate-limit entries");
            }
        }
    })
}
