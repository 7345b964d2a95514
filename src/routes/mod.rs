// Route module decomposition — each surface area in its own file.
// Shared request guards and the error-body helper live here.

mod agents;
mod messages;
mod session;
mod stream;
mod system;
mod threads;
mod wait;

// --- Re-exports (all route functions used by lib.rs mount) ---

pub use agents::list_agents;
pub use messages::send_message;
pub use session::{close_session, open_session};
pub use stream::session_stream;
pub use system::{health, not_found, stats, unauthorized};
pub use threads::{add_participant, close_thread, create_thread, get_thread, remove_participant};
pub use wait::wait_mentions;

use crate::registry::SessionRegistry;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;

/// Build the uniform error body: human message plus a machine-readable kind.
pub(crate) fn api_error(
    status: Status,
    kind: &str,
    message: &str,
) -> (Status, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!({"error": message, "kind": kind})),
    )
}

/// Request guard resolving `X-Session-Id` to a live agent. Requests without
/// a live session get a 401, which is the runtime's cue to reopen.
pub struct SessionAuth {
    pub session_id: String,
    pub agent_id: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(session_id) = req.headers().get_one("X-Session-Id") else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let Some(registry) = req.rocket().state::<SessionRegistry>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match registry.resolve(session_id) {
            Some(agent_id) => Outcome::Success(SessionAuth {
                session_id: session_id.to_string(),
                agent_id,
            }),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Like [`SessionAuth`] but tolerant of missing/stale sessions, for the
/// idempotent close operation.
pub struct MaybeSession(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(MaybeSession(
            req.headers().get_one("X-Session-Id").map(String::from),
        ))
    }
}
