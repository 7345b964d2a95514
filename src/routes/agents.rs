use crate::models::AgentSummary;
use crate::registry::SessionRegistry;
use rocket::serde::json::Json;
use rocket::{State, get};

use super::SessionAuth;

/// Snapshot of all live agents. Deliberately cheap — this is the operation
/// client runtimes fire as a keepalive ping, and it counts as activity for
/// the caller's own eviction clock.
#[get("/api/v1/agents?<details>")]
pub fn list_agents(
    registry: &State<SessionRegistry>,
    auth: SessionAuth,
    details: Option<bool>,
) -> Json<Vec<AgentSummary>> {
    registry.touch(&auth.agent_id);
    Json(registry.snapshot(details.unwrap_or(false)))
}
