use crate::config::HubConfig;
use crate::db::{self, Db};
use crate::events::{EventBus, HubEvent};
use crate::models::OpenSessionResponse;
use crate::registry::{OpenError, OpenParams, SessionRegistry};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};

use super::{MaybeSession, api_error};

/// Establish a session for an agent identity. The handshake rides in query
/// parameters so the URL can be pasted straight into configuration.
#[post(
    "/api/v1/session/open?<agent_id>&<agent_description>&<capabilities>&<wait_for_agents>&<application_id>&<privacy_key>"
)]
#[allow(clippy::too_many_arguments)]
pub fn open_session(
    registry: &State<SessionRegistry>,
    events: &State<EventBus>,
    config: &State<HubConfig>,
    agent_id: &str,
    agent_description: Option<&str>,
    capabilities: Option<&str>,
    wait_for_agents: Option<u32>,
    application_id: Option<&str>,
    privacy_key: Option<&str>,
) -> Result<Json<OpenSessionResponse>, (Status, Json<serde_json::Value>)> {
    if let Some(expected) = &config.privacy_key
        && privacy_key != Some(expected.as_str())
    {
        return Err(api_error(
            Status::Unauthorized,
            "unauthorized",
            "Privacy key missing or incorrect",
        ));
    }

    let agent_id = agent_id.trim().to_string();
    if agent_id.is_empty() || agent_id.len() > 100 {
        return Err(api_error(
            Status::BadRequest,
            "bad_request",
            "agent_id must be 1-100 characters",
        ));
    }

    let params = OpenParams {
        agent_id: agent_id.clone(),
        description: agent_description.unwrap_or("").trim().to_string(),
        capabilities: capabilities
            .unwrap_or("")
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        application_id: application_id.unwrap_or("default").trim().to_string(),
        wait_for_agents: wait_for_agents.unwrap_or(0),
    };

    let outcome = registry.open(params).map_err(|e| match e {
        OpenError::DuplicateAgent => api_error(
            Status::Conflict,
            "duplicate_agent",
            "An agent with this id already has a live session",
        ),
    })?;

    if outcome.displaced {
        println!("🔁 {agent_id} reopened its session (older session displaced)");
    } else {
        println!("👋 {agent_id} joined");
    }

    // Registry-change event for every attached push channel.
    let summary = registry
        .snapshot(false)
        .into_iter()
        .find(|a| a.agent_id == agent_id);
    if let Some(summary) = summary {
        events.publish(HubEvent::AgentJoined(summary));
    }

    Ok(Json(OpenSessionResponse {
        session_id: outcome.session_id,
        agent_id,
    }))
}

/// Idempotent session close. Discards the agent's mention buffer and marks it
/// departed in its threads; a second close (or a close with a stale id) is a
/// no-op reporting `closed: false`.
#[post("/api/v1/session/close")]
pub fn close_session(
    registry: &State<SessionRegistry>,
    events: &State<EventBus>,
    db: &State<Db>,
    session: MaybeSession,
) -> Json<serde_json::Value> {
    let Some(session_id) = session.0 else {
        return Json(serde_json::json!({"closed": false}));
    };

    match registry.close(&session_id) {
        Some(agent_id) => {
            {
                let conn = db.conn();
                db::mark_departed(&conn, &agent_id);
            }
            println!("👋 {agent_id} left");
            events.publish(HubEvent::AgentLeft {
                agent_id,
                reason: "closed".to_string(),
            });
            Json(serde_json::json!({"closed": true}))
        }
        None => Json(serde_json::json!({"closed": false})),
    }
}
