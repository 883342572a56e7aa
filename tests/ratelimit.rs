use std::sync::Arc;
use std::time::Duration;

use todovault::client::client_identifier;
use todovault::clock::{Clock, ManualClock};
use todovault::config::Config;
use todovault::ratelimit::{spawn_sweeper, RateGovernor};

#[test]
fn governor_uses_configured_policies() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_secs = 10;
    let clock = Arc::new(ManualClock::new(0));
    let governor = RateGovernor::from_config(&config, clock.clone());

    let client = client_identifier(&[("x-forwarded-for", "192.0.2.1, 10.0.0.1")]);
    assert_eq!(client, "192.0.2.1");

    assert!(governor.check(&client).allowed);
    assert!(governor.check(&client).allowed);
    let rejected = governor.check(&client);
    assert!(!rejected.allowed);
    assert_eq!(rejected.reset_time, 10_000);
    assert_eq!(rejected.retry_after_secs(clock.now_ms()), 10);

    clock.advance(10_001);
    let fresh = governor.check(&client);
    assert!(fresh.allowed);
    assert_eq!(fresh.remaining, 1);
}

#[test]
fn decision_serializes_camel_case() {
    let governor = RateGovernor::from_config(&Config::default(), Arc::new(ManualClock::new(5)));
    let decision = governor.check("unknown");
    let json = serde_json::to_value(decision).expect("serialize");
    assert_eq!(json["allowed"], true);
    assert_eq!(json["remaining"], 99);
    assert_eq!(json["resetTime"], 60_005);
}

#[tokio::test(start_paused = true)]
async fn sweeper_runs_on_configured_interval() {
    let config = Config::default();
    let clock = Arc::new(ManualClock::new(0));
    let governor = Arc::new(RateGovernor::from_config(&config, clock.clone()));
    let handle = spawn_sweeper(&governor, config.sweeper.interval());

    governor.check("a");
    governor.check_auth("a");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(governor.general().tracked(), 1);

    // past the general window, inside the auth window
    clock.advance(61_000);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(governor.general().tracked(), 0);
    assert_eq!(governor.auth().tracked(), 1);

    handle.abort();
}
