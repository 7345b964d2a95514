use crate::common::*;
use rocket::http::{Header, Status};
use std::time::{Duration, Instant};

// --- Scenario: single mention, buffered before the wait ---

#[rocket::async_test]
async fn test_single_mention_delivery() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    asend(&client, &coord, &t1, "@media create a song about cake", &["media"]).await;

    let batch = await_mentions(&client, &media, 8000).await;
    assert_eq!(batch["count"], 1);
    let delivery = &batch["deliveries"][0];
    assert_eq!(delivery["sender"], "coord");
    assert_eq!(delivery["thread_id"].as_str().unwrap(), t1);
    assert!(delivery["body"].as_str().unwrap().contains("cake"));
}

// --- Scenario: empty wait returns an empty batch after the timeout ---

#[rocket::async_test]
async fn test_empty_wait_times_out() {
    let client = async_client().await;
    let media = aopen(&client, "media").await;

    let started = Instant::now();
    let batch = await_mentions(&client, &media, 500).await;
    let elapsed = started.elapsed();

    assert_eq!(batch["count"], 0);
    assert!(batch["deliveries"].as_array().unwrap().is_empty());
    assert!(elapsed >= Duration::from_millis(480), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "returned late: {elapsed:?}");
}

#[rocket::async_test]
async fn test_zero_timeout_returns_immediately() {
    let client = async_client().await;
    let media = aopen(&client, "media").await;

    let started = Instant::now();
    let batch = await_mentions(&client, &media, 0).await;
    assert_eq!(batch["count"], 0);
    assert!(started.elapsed() < Duration::from_millis(500));
}

// --- Scenario: timeout ceiling ---

#[rocket::async_test]
async fn test_timeout_too_large_reports_ceiling() {
    let client = async_client().await;
    let media = aopen(&client, "media").await;

    let res = wait_raw(&client, &media, 120_000).await;
    assert_eq!(res.status(), Status::BadRequest);
    let body: serde_json::Value = res.into_json().await.unwrap();
    assert_eq!(body["kind"], "timeout_too_large");
    assert_eq!(body["max_wait_ms"], 60_000);
}

// --- A parked wait unblocks when a mention arrives ---

#[rocket::async_test]
async fn test_parked_wait_receives_delivery() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    let started = Instant::now();
    let (batch, _) = tokio::join!(await_mentions(&client, &media, 10_000), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        asend(&client, &coord, &t1, "@media wake up", &[]).await;
    });

    assert_eq!(batch["count"], 1);
    assert_eq!(batch["deliveries"][0]["sender"], "coord");
    // Delivered on arrival, not at the end of the budget.
    assert!(started.elapsed() < Duration::from_secs(5));
}

// --- Single-flight enforcement ---

#[rocket::async_test]
async fn test_second_concurrent_wait_rejected() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    let (first, _) = tokio::join!(await_mentions(&client, &media, 5_000), async {
        tokio::time::sleep(Duration::from_millis(300)).await;

        let res = wait_raw(&client, &media, 1_000).await;
        assert_eq!(res.status(), Status::Conflict);
        let body: serde_json::Value = res.into_json().await.unwrap();
        assert_eq!(body["kind"], "wait_already_active");

        // Unblock the first wait.
        asend(&client, &coord, &t1, "@media done", &[]).await;
    });

    assert_eq!(first["count"], 1);
}

// --- Drained deliveries never reappear ---

#[rocket::async_test]
async fn test_no_duplicate_deliveries_across_waits() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    asend(&client, &coord, &t1, "@media one", &[]).await;
    asend(&client, &coord, &t1, "@media two", &[]).await;

    let batch = await_mentions(&client, &media, 1_000).await;
    assert_eq!(batch["count"], 2);

    let batch = await_mentions(&client, &media, 300).await;
    assert_eq!(batch["count"], 0);
}

// --- Delivery order follows the append order across threads ---

#[rocket::async_test]
async fn test_delivery_order_across_threads() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;
    let t2 = acreate_thread(&client, &coord, "t2", &["media"]).await;

    asend(&client, &coord, &t1, "@media first", &[]).await;
    asend(&client, &coord, &t2, "@media second", &[]).await;
    asend(&client, &coord, &t1, "@media third", &[]).await;

    let batch = await_mentions(&client, &media, 1_000).await;
    assert_eq!(batch["count"], 3);
    let deliveries = batch["deliveries"].as_array().unwrap();
    let bodies: Vec<&str> = deliveries
        .iter()
        .map(|d| d["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["@media first", "@media second", "@media third"]);
    let seqs: Vec<i64> = deliveries.iter().map(|d| d["seq"].as_i64().unwrap()).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

// --- The sender is never self-delivered ---

#[rocket::async_test]
async fn test_no_self_delivery() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let t1 = acreate_thread(&client, &coord, "notes", &[]).await;

    asend(&client, &coord, &t1, "note to @coord myself", &["coord"]).await;

    let batch = await_mentions(&client, &coord, 300).await;
    assert_eq!(batch["count"], 0);
}

// --- Session close cancels a parked wait ---

#[rocket::async_test]
async fn test_close_cancels_parked_wait() {
    let client = async_client().await;
    let media = aopen(&client, "media").await;

    let started = Instant::now();
    let (batch, _) = tokio::join!(await_mentions(&client, &media, 10_000), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let res = client
            .post("/api/v1/session/close")
            .header(Header::new("X-Session-Id", media.clone()))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
    });

    assert_eq!(batch["count"], 0);
    assert!(started.elapsed() < Duration::from_secs(5));
}

// --- Scenario: cross-session routing ---

#[rocket::async_test]
async fn test_routing_is_by_agent_id_not_session() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let s1 = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    // media drops and reopens with a new session.
    let s2 = aopen(&client, "media").await;
    assert_ne!(s1, s2);

    asend(&client, &coord, &t1, "@media after reopen", &[]).await;

    let batch = await_mentions(&client, &s2, 2_000).await;
    assert_eq!(batch["count"], 1);
    assert_eq!(batch["deliveries"][0]["body"], "@media after reopen");
}

// --- Buffered mentions survive displacement (grace-window reattach) ---

#[rocket::async_test]
async fn test_buffer_survives_displacement() {
    let client = async_client().await;
    let coord = aopen(&client, "coord").await;
    let _s1 = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    asend(&client, &coord, &t1, "@media buffered before reconnect", &[]).await;

    // Reconnect under the same agent id: the undrained delivery reattaches.
    let s2 = aopen(&client, "media").await;
    let batch = await_mentions(&client, &s2, 1_000).await;
    assert_eq!(batch["count"], 1);
    assert_eq!(
        batch["deliveries"][0]["body"],
        "@media buffered before reconnect"
    );
}

// --- Displacement cancels the displaced session's parked wait ---

#[rocket::async_test]
async fn test_displacement_cancels_parked_wait() {
    let client = async_client().await;
    let media = aopen(&client, "media").await;

    let (batch, _) = tokio::join!(await_mentions(&client, &media, 10_000), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        aopen(&client, "media").await;
    });

    assert_eq!(batch["count"], 0);
}

// --- Drain cap leaves the overflow for the next wait ---

#[rocket::async_test]
async fn test_wait_drains_up_to_cap() {
    use agent_fabric::config::HubConfig;
    let config = HubConfig {
        wait_drain_cap: 2,
        ..HubConfig::default()
    };
    let rocket = agent_fabric::rocket_with_config(config);
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .expect("valid rocket instance");

    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    for i in 1..=3 {
        asend(&client, &coord, &t1, &format!("@media msg {i}"), &[]).await;
    }

    let batch = await_mentions(&client, &media, 500).await;
    assert_eq!(batch["count"], 2);
    let batch = await_mentions(&client, &media, 500).await;
    assert_eq!(batch["count"], 1);
    assert_eq!(batch["deliveries"][0]["body"], "@media msg 3");
}

// --- Buffer overflow drops oldest and is observable ---

#[rocket::async_test]
async fn test_buffer_overflow_drops_oldest() {
    use agent_fabric::config::HubConfig;
    let config = HubConfig {
        mention_buffer_cap: 2,
        ..HubConfig::default()
    };
    let rocket = agent_fabric::rocket_with_config(config);
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .expect("valid rocket instance");

    let coord = aopen(&client, "coord").await;
    let media = aopen(&client, "media").await;
    let t1 = acreate_thread(&client, &coord, "t1", &["media"]).await;

    for i in 1..=4 {
        asend(&client, &coord, &t1, &format!("@media msg {i}"), &[]).await;
    }

    // Drop counter is visible in detail mode.
    let res = client
        .get("/api/v1/agents?details=true")
        .header(Header::new("X-Session-Id", coord.clone()))
        .dispatch()
        .await;
    let agents: serde_json::Value = res.into_json().await.unwrap();
    let media_entry = agents
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["agent_id"] == "media")
        .unwrap()
        .clone();
    assert_eq!(media_entry["mention_buffer_depth"], 2);
    assert_eq!(media_entry["mentions_dropped"], 2);

    // Oldest were dropped: only the newest two remain.
    let batch = await_mentions(&client, &media, 500).await;
    assert_eq!(batch["count"], 2);
    assert_eq!(batch["deliveries"][0]["body"], "@media msg 3");
    assert_eq!(batch["deliveries"][1]["body"], "@media msg 4");
}
