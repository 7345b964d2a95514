use crate::config::HubConfig;
use crate::models::{WaitRequest, WaitResponse};
use crate::registry::{BeginWait, SessionRegistry};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use tokio::time::Duration;

use super::{SessionAuth, api_error};

/// Long-poll for addressed work. Returns immediately when the caller's
/// mention buffer is non-empty, otherwise parks until a mention arrives or
/// the timeout elapses (an empty batch, not an error). Deliveries returned
/// here are gone from the buffer before the response is observable.
#[post("/api/v1/mentions/wait", format = "json", data = "<body>")]
pub async fn wait_mentions(
    registry: &State<SessionRegistry>,
    config: &State<HubConfig>,
    auth: SessionAuth,
    body: Json<WaitRequest>,
) -> Result<Json<WaitResponse>, (Status, Json<serde_json::Value>)> {
    // The ceiling is validated up front and spelled out in the error payload:
    // oversized timeouts have broken interop before, so clients get the max
    // to clamp to.
    if body.timeout_ms > config.max_wait_ms {
        return Err((
            Status::BadRequest,
            Json(serde_json::json!({
                "error": format!(
                    "timeout_ms {} exceeds the maximum of {}",
                    body.timeout_ms, config.max_wait_ms
                ),
                "kind": "timeout_too_large",
                "max_wait_ms": config.max_wait_ms,
            })),
        ));
    }

    registry.touch(&auth.agent_id);

    let deliveries = match registry.begin_wait(&auth.agent_id, config.wait_drain_cap) {
        BeginWait::Ready(batch) => batch,
        BeginWait::AlreadyActive => {
            return Err(api_error(
                Status::Conflict,
                "wait_already_active",
                "Another wait is already active for this agent",
            ));
        }
        BeginWait::UnknownAgent => {
            return Err(api_error(
                Status::Unauthorized,
                "unauthorized",
                "Session is no longer live",
            ));
        }
        BeginWait::Parked(mut rx) => {
            tokio::select! {
                res = &mut rx => {
                    // A dropped sender means the session closed or was
                    // displaced while parked: an empty batch, with the close
                    // surfacing on the transport.
                    res.unwrap_or_default()
                }
                _ = tokio::time::sleep(Duration::from_millis(body.timeout_ms)) => {
                    let mut batch = registry.finish_wait(&auth.agent_id, config.wait_drain_cap);
                    // Catch a delivery that won the race against the timeout.
                    if let Ok(fired) = rx.try_recv() {
                        batch.extend(fired);
                    }
                    batch
                }
            }
        }
    };

    Ok(Json(WaitResponse {
        count: deliveries.len(),
        deliveries,
    }))
}
