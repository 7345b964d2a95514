#![allow(dead_code)]

use agent_fabric::config::HubConfig;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client as AsyncClient;
use rocket::local::blocking::Client;

pub fn test_client() -> Client {
    let rocket = agent_fabric::rocket_with_config(HubConfig::default());
    Client::tracked(rocket).expect("valid rocket instance")
}

pub fn test_client_with_config(config: HubConfig) -> Client {
    let rocket = agent_fabric::rocket_with_config(config);
    Client::tracked(rocket).expect("valid rocket instance")
}

pub async fn async_client() -> AsyncClient {
    let rocket = agent_fabric::rocket_with_config(HubConfig::default());
    AsyncClient::tracked(rocket)
        .await
        .expect("valid rocket instance")
}

// --- Blocking helpers ---

/// Open a session and return its session id.
pub fn open(client: &Client, agent_id: &str) -> String {
    let res = client
        .post(format!("/api/v1/session/open?agent_id={agent_id}"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

pub fn create_thread(client: &Client, session_id: &str, name: &str, participants: &[&str]) -> String {
    let body = serde_json::json!({"name": name, "participants": participants});
    let res = client
        .post("/api/v1/threads")
        .header(ContentType::JSON)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    body["thread_id"].as_str().unwrap().to_string()
}

pub fn send(
    client: &Client,
    session_id: &str,
    thread_id: &str,
    body_text: &str,
    mentions: &[&str],
) -> serde_json::Value {
    let res = send_raw(client, session_id, thread_id, body_text, mentions);
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

pub fn send_raw<'a>(
    client: &'a Client,
    session_id: &str,
    thread_id: &str,
    body_text: &str,
    mentions: &[&str],
) -> rocket::local::blocking::LocalResponse<'a> {
    let body = serde_json::json!({"body": body_text, "mentions": mentions});
    client
        .post(format!("/api/v1/threads/{thread_id}/messages"))
        .header(ContentType::JSON)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .body(body.to_string())
        .dispatch()
}

pub fn get_thread(client: &Client, session_id: &str, thread_id: &str) -> serde_json::Value {
    let res = client
        .get(format!("/api/v1/threads/{thread_id}"))
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

pub fn list_agents(client: &Client, session_id: &str, details: bool) -> serde_json::Value {
    let path = if details {
        "/api/v1/agents?details=true"
    } else {
        "/api/v1/agents"
    };
    let res = client
        .get(path)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

// --- Async helpers (for wait-coordination tests) ---

pub async fn aopen(client: &AsyncClient, agent_id: &str) -> String {
    let res = client
        .post(format!("/api/v1/session/open?agent_id={agent_id}"))
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

pub async fn acreate_thread(
    client: &AsyncClient,
    session_id: &str,
    name: &str,
    participants: &[&str],
) -> String {
    let body = serde_json::json!({"name": name, "participants": participants});
    let res = client
        .post("/api/v1/threads")
        .header(ContentType::JSON)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .body(body.to_string())
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().await.unwrap();
    body["thread_id"].as_str().unwrap().to_string()
}

pub async fn asend(
    client: &AsyncClient,
    session_id: &str,
    thread_id: &str,
    body_text: &str,
    mentions: &[&str],
) -> serde_json::Value {
    let body = serde_json::json!({"body": body_text, "mentions": mentions});
    let res = client
        .post(format!("/api/v1/threads/{thread_id}/messages"))
        .header(ContentType::JSON)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .body(body.to_string())
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    res.into_json().await.unwrap()
}

/// Issue a wait and return the parsed response body (asserting 200).
pub async fn await_mentions(
    client: &AsyncClient,
    session_id: &str,
    timeout_ms: u64,
) -> serde_json::Value {
    let res = wait_raw(client, session_id, timeout_ms).await;
    assert_eq!(res.status(), Status::Ok);
    res.into_json().await.unwrap()
}

pub async fn wait_raw<'a>(
    client: &'a AsyncClient,
    session_id: &str,
    timeout_ms: u64,
) -> rocket::local::asynchronous::LocalResponse<'a> {
    client
        .post("/api/v1/mentions/wait")
        .header(ContentType::JSON)
        .header(Header::new("X-Session-Id", session_id.to_string()))
        .body(serde_json::json!({"timeout_ms": timeout_ms}).to_string())
        .dispatch()
        .await
}
