use crate::common::*;
use agent_fabric::config::HubConfig;
use rocket::http::{Header, Status};
use std::time::Duration;

/// An agent whose stream never attaches (or never comes back) is evicted
/// once the grace window passes, taking its registration and buffer with it.
#[test]
fn test_detached_agent_evicted_after_grace() {
    let config = HubConfig {
        reconnect_grace_ms: 300,
        ..HubConfig::default()
    };
    let client = test_client_with_config(config);

    let ghost = open(&client, "ghost");

    // The reaper sweeps once a second; give it time to pass the window.
    std::thread::sleep(Duration::from_secs(3));

    let observer = open(&client, "observer");
    let agents = list_agents(&client, &observer, false);
    assert!(
        !agents
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["agent_id"] == "ghost"),
        "ghost should have been evicted"
    );

    // The evicted session no longer authenticates.
    let res = client
        .get("/api/v1/agents")
        .header(Header::new("X-Session-Id", ghost))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

/// Reopening inside the grace window keeps the registration (and the mention
/// buffer, covered in wait.rs); the agent is not evicted out from under the
/// fresh session.
#[test]
fn test_reopen_within_grace_survives() {
    let config = HubConfig {
        reconnect_grace_ms: 30_000,
        ..HubConfig::default()
    };
    let client = test_client_with_config(config);

    open(&client, "media");
    let second = open(&client, "media");

    std::thread::sleep(Duration::from_millis(1500));

    let agents = list_agents(&client, &second, false);
    assert!(
        agents
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["agent_id"] == "media")
    );
}
