//! Shared-password authentication.

use crate::client::HeaderLookup;
use crate::config::AuthConfig;
use crate::ratelimit::RateLimitDecision;

/// Checks presented passwords against the configured shared secret.
#[derive(Clone, Default)]
pub struct Authenticator {
    password: Option<String>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("configured", &self.password.is_some())
            .finish()
    }
}

impl Authenticator {
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.password.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.password.is_some()
    }

    /// True when `candidate` matches the configured password. Always false
    /// when no password is configured.
    pub fn verify(&self, candidate: &str) -> bool {
        match &self.password {
            Some(expected) => constant_time_eq(expected.as_bytes(), candidate.as_bytes()),
            None => false,
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Credential carried by a request: `x-api-key`, else a bearer token.
pub fn api_key_from_headers<H: HeaderLookup + ?Sized>(headers: &H) -> Option<String> {
    if let Some(key) = headers.header("x-api-key").map(str::trim) {
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    let authorization = headers.header("authorization")?.trim();
    let (scheme, token) = authorization.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

/// Result of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    Denied,
    /// The client exhausted its attempts; the password was not checked.
    RateLimited(RateLimitDecision),
}

impl AuthOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthOutcome::Granted)
    }
}
