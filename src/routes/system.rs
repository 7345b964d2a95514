use crate::db::Db;
use crate::registry::SessionRegistry;
use rocket::serde::json::Json;
use rocket::{State, catch, get};

#[get("/api/v1/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-fabric",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/api/v1/stats")]
pub fn stats(db: &State<Db>, registry: &State<SessionRegistry>) -> Json<serde_json::Value> {
    let (agents, buffered_mentions, dropped_mentions) = registry.stats();

    let conn = db.conn();
    let thread_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM threads", [], |r| r.get(0))
        .unwrap_or(0);
    let open_threads: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM threads WHERE closed_at IS NULL",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let message_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))
        .unwrap_or(0);

    Json(serde_json::json!({
        "agents": agents,
        "threads": thread_count,
        "open_threads": open_threads,
        "messages": message_count,
        "buffered_mentions": buffered_mentions,
        "dropped_mentions": dropped_mentions,
    }))
}

#[catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found", "kind": "not_found"}))
}

#[catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Missing or unknown session",
        "kind": "unauthorized"
    }))
}
