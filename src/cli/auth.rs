//! todovault auth command

use crate::auth::AuthOutcome;
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

/// Options for `todovault auth`
pub struct AuthOptions {
    pub api_key: Option<String>,
    pub ip: Option<String>,
    pub ctx: Context,
}

#[derive(serde::Serialize)]
struct AuthReport {
    client: String,
    granted: bool,
}

pub fn run_auth(options: AuthOptions) -> Result<()> {
    let service = options.ctx.open_service()?;

    let mut headers: Vec<(&str, &str)> = Vec::new();
    if let Some(key) = options.api_key.as_deref() {
        headers.push(("x-api-key", key));
    }
    if let Some(ip) = options.ip.as_deref() {
        headers.push(("x-real-ip", ip));
    }

    let (client, outcome) = service.authenticate_headers(headers.as_slice());
    match outcome {
        AuthOutcome::Granted => {}
        AuthOutcome::Denied => return Err(Error::AuthenticationFailed),
        AuthOutcome::RateLimited(decision) => {
            return Err(Error::RateLimited {
                retry_after_secs: decision.retry_after_secs(service.now_ms()),
            })
        }
    }

    let mut human = HumanOutput::new("todovault auth: granted");
    human.push_summary("client", client.as_str());
    let report = AuthReport {
        client,
        granted: true,
    };
    emit_success(options.ctx.output(), "auth", &report, Some(&human))
}
